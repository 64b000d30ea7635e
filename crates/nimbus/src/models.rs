//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai-compatible chat completion messages/tools, sent from the agent to the LLM
//! - tool requests, sent from the agent to the weather tool or a caller-supplied tool
//! - checkpointed conversation state, kept between turns of a session
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers, so the internal models are not an exact match to any wire format.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
