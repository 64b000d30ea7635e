use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::state::ConversationState;

/// Where the conversation goes after a chat step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tool,
    End,
}

/// Continue to the tool step when the last message requests at least one tool call
pub fn should_continue(messages: &[Message]) -> AgentResult<Route> {
    let last = messages.last().ok_or(AgentError::EmptyConversation)?;
    if last.has_tool_requests() {
        Ok(Route::Tool)
    } else {
        Ok(Route::End)
    }
}

/// Chooses the transition out of the chat step
pub trait Router: Send + Sync {
    fn route(&self, state: &ConversationState) -> AgentResult<Route>;
}

impl<F> Router for F
where
    F: Fn(&ConversationState) -> AgentResult<Route> + Send + Sync,
{
    fn route(&self, state: &ConversationState) -> AgentResult<Route> {
        self(state)
    }
}

/// Every requested call is executed by the agent
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteAllTools;

impl Router for ExecuteAllTools {
    fn route(&self, state: &ConversationState) -> AgentResult<Route> {
        should_continue(&state.messages)
    }
}

/// Ends the turn whenever a pending call names a caller-declared tool, so the caller can run it
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientSideTools;

impl Router for ClientSideTools {
    fn route(&self, state: &ConversationState) -> AgentResult<Route> {
        let route = should_continue(&state.messages)?;
        if route == Route::End {
            return Ok(route);
        }

        let client_call = state
            .last_message()
            .map(|message| {
                message.tool_requests().iter().any(|request| {
                    request
                        .tool_call
                        .as_ref()
                        .is_ok_and(|call| state.external_tool(&call.name).is_some())
                })
            })
            .unwrap_or(false);

        if client_call {
            tracing::debug!("Handing pending tool calls back to the caller");
            Ok(Route::End)
        } else {
            Ok(Route::Tool)
        }
    }
}
