//! Chat/Match gateway — context loading, prompt composition, model
//! invocation, streaming frame parsing, and response normalization.

pub mod context;
pub mod handlers;
pub mod normalize;
pub mod prompts;
pub mod stream;
