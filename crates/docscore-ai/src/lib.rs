//! Model side of an evaluation run: the HTTP inference backend, lenient
//! parsing of model output into records, and token estimation.

pub mod client;
pub mod response;
pub mod tokens;

pub use client::{InferenceClient, InferenceError};
pub use response::{NOT_AVAILABLE, ParseError, parse_prediction, parse_response};
pub use tokens::{ApproxTokenCounter, TokenCounter, load_counter};
#[cfg(feature = "hf-tokenizer")]
pub use tokens::HfTokenCounter;
