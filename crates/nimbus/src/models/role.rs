use serde::{Deserialize, Serialize};

/// The author of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Carries the result of exactly one tool request
    Tool,
}
