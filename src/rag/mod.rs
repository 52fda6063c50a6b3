//! Retrieval-augmented answering.
//!
//! [`ContextBuilder`] finds the stored chunks relevant to a query and
//! [`RagAnswerPipeline`] turns a chat question into a grounded answer.

pub mod context;
mod pipeline;

pub use context::ContextBuilder;
pub use pipeline::{ChatAnswer, ChatRequest, RagAnswerPipeline, DEFAULT_USER_ID};
