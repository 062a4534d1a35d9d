//! buns-ai: forwards free-text queries to a hosted model.

pub mod client;
pub mod forwarder;

pub use client::{
    AnthropicClient, ContentBlock, Message, MessageRequest, MessageResponse, ModelClient,
    QueryError,
};
pub use forwarder::{QueryForwarder, code_task_prompt, describe_error, query_prompt};
