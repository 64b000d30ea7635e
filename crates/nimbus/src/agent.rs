use anyhow::{anyhow, Result};
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::providers::configs::ModelTier;
use crate::routing::{ExecuteAllTools, Route, Router};
use crate::state::{ConversationState, ExternalTool};
use crate::weather::tool::{is_current_location, WeatherTool, WEATHER_TOOL_NAME};

type SessionLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Exclusive access to one session for the length of a turn
///
/// The session's entry is removed from the lock table once no other turn holds or waits on it.
struct SessionTurn<'a> {
    sessions: &'a SessionLocks,
    session_id: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> SessionTurn<'a> {
    async fn begin(sessions: &'a SessionLocks, session_id: &str) -> SessionTurn<'a> {
        let lock = sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_default()
            .clone();

        let mut turn = SessionTurn {
            sessions,
            session_id: session_id.to_string(),
            lock,
            guard: None,
        };
        turn.guard = Some(turn.lock.clone().lock_owned().await);
        turn
    }
}

impl Drop for SessionTurn<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one held here
        if Arc::strong_count(&self.lock) == 2 {
            sessions.remove(&self.session_id);
        }
    }
}

/// The step the conversation runs next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Chat,
    Tool,
}

/// Agent drives a conversation between the model and its tools
///
/// Each turn runs the chat step, asks the router where to go, runs the requested tools and
/// returns to the chat step until the router ends the turn. Turns of one session are
/// serialized; the session state is checkpointed only once a turn completes.
pub struct Agent {
    provider: Box<dyn Provider>,
    weather: WeatherTool,
    router: Box<dyn Router>,
    checkpoints: Arc<dyn CheckpointStore>,
    tier: ModelTier,
    sessions: SessionLocks,
}

impl Agent {
    /// Create a new Agent that executes every tool call and keeps checkpoints in memory
    pub fn new(provider: Box<dyn Provider>, weather: WeatherTool) -> Self {
        Self {
            provider,
            weather,
            router: Box::new(ExecuteAllTools),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            tier: ModelTier::Hosted,
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_router(mut self, router: impl Router + 'static) -> Self {
        self.router = Box::new(router);
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Select the system prompt variant
    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    /// The checkpointed state of a session, if it has completed a turn
    pub async fn state(&self, session_id: &str) -> Result<Option<ConversationState>> {
        self.checkpoints.load(session_id).await
    }

    fn get_system_prompt(&self) -> AgentResult<String> {
        let context = json!({
            "tier": self.tier,
            "tool_name": WEATHER_TOOL_NAME,
        });
        load_prompt_file("system.md", &context).map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Drop caller tools that would shadow the weather tool
    fn accept_external_tools(&self, external_tools: Vec<ExternalTool>) -> Vec<ExternalTool> {
        external_tools
            .into_iter()
            .filter(|tool| {
                if tool.name() == WEATHER_TOOL_NAME {
                    tracing::warn!("Ignoring external tool that shadows {}", WEATHER_TOOL_NAME);
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    fn get_tools(&self, state: &ConversationState) -> Vec<Tool> {
        std::iter::once(self.weather.tool())
            .chain(state.external_tools.iter().map(|tool| tool.tool.clone()))
            .collect()
    }

    async fn chat(&self, state: &ConversationState) -> Result<Message> {
        let system_prompt = self.get_system_prompt()?;
        let tools = self.get_tools(state);

        let (response, usage) = self
            .provider
            .complete(&system_prompt, &state.messages, &tools)
            .await?;
        tracing::debug!(
            total_tokens = ?usage.total_tokens,
            tool_requests = response.tool_requests().len(),
            "Chat step complete"
        );

        Ok(response)
    }

    /// Replace the "current location" sentinel with the last place the session asked about
    fn weather_arguments(&self, state: &ConversationState, arguments: &Value) -> Value {
        let sentinel = arguments
            .get("cityName")
            .and_then(Value::as_str)
            .is_some_and(is_current_location);

        match (&state.last_location, sentinel) {
            (Some(location), true) => {
                tracing::debug!("Using last location {} for current location", location);
                let mut arguments = arguments.clone();
                arguments["cityName"] = json!(location);
                arguments
            }
            _ => arguments.clone(),
        }
    }

    /// Execute one tool request and build its tool-role response.
    ///
    /// Calling a tool that is not offered, or a caller tool without a handler, is an error
    /// for the whole turn. Anything else the model can react to is reported in the response.
    async fn dispatch_tool_call(
        &self,
        state: &mut ConversationState,
        request: &ToolRequest,
    ) -> AgentResult<Message> {
        let call = match &request.tool_call {
            Ok(call) => call,
            Err(e) => return Ok(Message::tool(&request.id, Err(e.clone()))),
        };

        if call.name == WEATHER_TOOL_NAME {
            let arguments = self.weather_arguments(state, &call.arguments);
            let report = self.weather.run(&arguments).await;
            if let Some(location) = report.location() {
                state.last_location = Some(location.to_string());
            }
            return Ok(Message::tool(
                &request.id,
                Ok(vec![Content::text(report.to_json())]),
            ));
        }

        let external = state
            .external_tool(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        let handler = external
            .handler
            .clone()
            .ok_or_else(|| AgentError::NoHandler(call.name.clone()))?;

        let output = handler
            .call(call.arguments.clone())
            .await
            .map(|text| vec![Content::text(text)]);
        Ok(Message::tool(&request.id, output))
    }

    /// Run one turn for a session, yielding every message it produces
    pub async fn reply(
        &self,
        session_id: &str,
        text: &str,
        external_tools: Vec<ExternalTool>,
    ) -> Result<BoxStream<'_, Result<Message>>> {
        let session_id = session_id.to_string();
        let human = Message::user().with_text(text);
        let external_tools = self.accept_external_tools(external_tools);

        Ok(Box::pin(async_stream::try_stream! {
            let _turn = SessionTurn::begin(&self.sessions, &session_id).await;

            let mut state = self
                .checkpoints
                .load(&session_id)
                .await?
                .unwrap_or_default();
            state.external_tools = external_tools;
            state.push(human);

            let mut node = Node::Chat;
            loop {
                match node {
                    Node::Chat => {
                        let response = self.chat(&state).await?;
                        state.push(response.clone());
                        yield response;

                        // Ensure the response reaches the caller before tools start running
                        tokio::task::yield_now().await;

                        node = match self.router.route(&state)? {
                            Route::Tool => Node::Tool,
                            Route::End => break,
                        };
                    }
                    Node::Tool => {
                        let requests: Vec<ToolRequest> = state
                            .last_message()
                            .map(|message| message.tool_requests().into_iter().cloned().collect())
                            .unwrap_or_default();

                        for request in &requests {
                            let message = self.dispatch_tool_call(&mut state, request).await?;
                            state.push(message.clone());
                            yield message;
                        }

                        node = Node::Chat;
                    }
                }
            }

            tracing::debug!(
                session = %session_id,
                messages = state.messages.len(),
                "Saving checkpoint"
            );
            self.checkpoints.save(&session_id, state).await?;
        }))
    }

    /// Run one turn and return the final assistant message
    pub async fn run_turn(
        &self,
        session_id: &str,
        text: &str,
        external_tools: Vec<ExternalTool>,
    ) -> Result<Message> {
        let mut stream = self.reply(session_id, text, external_tools).await?;

        let mut last = None;
        while let Some(message) = stream.next().await {
            last = Some(message?);
        }

        last.ok_or_else(|| anyhow!("Turn produced no messages"))
    }
}
