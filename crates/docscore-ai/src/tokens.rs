//! Token estimation for request and response text.

use std::path::Path;

use tracing::{info, warn};

/// Counts model tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Roughly four characters per token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// Exact counts from a HuggingFace `tokenizer.json`.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenCounter {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        anyhow::ensure!(path.exists(), "tokenizer not found: {}", path.display());
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        info!(path = %path.display(), "loaded tokenizer");
        Ok(Self { tokenizer })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                warn!(error = %e, "tokenizer failed, using approximation");
                ApproxTokenCounter.count(text)
            }
        }
    }
}

/// Pick a counter: the configured tokenizer when available, else the
/// character approximation.
pub fn load_counter(tokenizer: Option<&Path>) -> anyhow::Result<Box<dyn TokenCounter>> {
    match tokenizer {
        #[cfg(feature = "hf-tokenizer")]
        Some(path) => Ok(Box::new(HfTokenCounter::load(path)?)),
        #[cfg(not(feature = "hf-tokenizer"))]
        Some(path) => {
            warn!(
                path = %path.display(),
                "built without `hf-tokenizer`, approximating token counts"
            );
            Ok(Box::new(ApproxTokenCounter))
        }
        None => {
            info!("no tokenizer configured, approximating token counts");
            Ok(Box::new(ApproxTokenCounter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_rounds_up() {
        let counter = ApproxTokenCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abc"), 1);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn approx_counts_characters_not_bytes() {
        assert_eq!(ApproxTokenCounter.count("äöüß"), 1);
    }

    #[test]
    fn no_tokenizer_falls_back_to_approximation() {
        let counter = load_counter(None).unwrap();
        assert_eq!(counter.count("12345678"), 2);
    }

    #[cfg(feature = "hf-tokenizer")]
    #[test]
    fn missing_tokenizer_file_errors() {
        assert!(load_counter(Some(Path::new("/nonexistent/tokenizer.json"))).is_err());
    }
}
