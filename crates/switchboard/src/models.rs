//! The objects passed between the engine, the providers, and the tools.
//!
//! The internal message model is provider-neutral: tool requests and tool
//! results ride inside messages as tagged content, and the provider layer
//! converts them to and from the wire format of the chat API it talks to.

pub mod message;
pub mod tool;
