use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use super::base::Usage;
use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to the OpenAI chat completion message specification
///
/// Each tool response becomes its own `tool` role entry keyed by the originating call id,
/// so a tool-role message and a user message carrying responses convert the same way.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = Map::new();
        converted.insert("role".to_string(), json!(message.role));

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        texts.push(text.text.clone());
                    }
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => {
                        tool_calls.push(json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&tool_call.name),
                                "arguments": tool_call.arguments.to_string(),
                            }
                        }));
                    }
                    // Replay what the model sent so the error response still has a call to pair with
                    Err(_) => {
                        let raw = request.raw.as_ref();
                        let name = raw
                            .map(|raw| sanitize_function_name(&raw.name))
                            .filter(|name| !name.is_empty())
                            .unwrap_or_else(|| "unknown_tool".to_string());
                        let arguments = raw
                            .map(|raw| raw.arguments.clone())
                            .filter(|arguments| !arguments.trim().is_empty())
                            .unwrap_or_else(|| "{}".to_string());
                        tool_calls.push(json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": arguments,
                            }
                        }));
                    }
                },
                MessageContent::ToolResponse(response) => {
                    let content = match &response.tool_result {
                        Ok(_) => content.as_tool_response_text().unwrap_or_default(),
                        // A tool result error is shown as output so the model can interpret the error message
                        Err(e) => format!("The tool call returned the following error:\n{}", e),
                    };
                    output.push(json!({
                        "role": "tool",
                        "content": content,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if !texts.is_empty() {
            converted.insert("content".to_string(), json!(texts.join("\n")));
        }
        if !tool_calls.is_empty() {
            converted.insert("tool_calls".to_string(), json!(tool_calls));
        }

        // Tool-role messages are fully represented by their tool entries
        if message.role != Role::Tool
            && (converted.contains_key("content") || converted.contains_key("tool_calls"))
        {
            output.insert(0, Value::Object(converted));
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build a chat completion request body
pub fn create_request(
    model: &str,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
    temperature: Option<f32>,
    max_tokens: Option<i32>,
) -> Result<Value> {
    let mut messages_array = vec![json!({
        "role": "system",
        "content": system
    })];
    messages_array.extend(messages_to_openai_spec(messages));

    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert("messages".to_string(), json!(messages_array));

    let tools_spec = tools_to_openai_spec(tools)?;
    if !tools_spec.is_empty() {
        payload.insert("tools".to_string(), json!(tools_spec));
    }
    if let Some(temp) = temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }

    Ok(Value::Object(payload))
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    let original = response["choices"][0]["message"].clone();
    if original.is_null() {
        return Err(anyhow!("No message in response: {}", response));
    }

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|text| text.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|calls| calls.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                message = message.with_unparsed_tool_request(id, function_name, arguments, error);
                continue;
            }

            // Some local models send an empty string for tools without arguments
            let parsed = if arguments.trim().is_empty() {
                Ok(json!({}))
            } else {
                serde_json::from_str::<Value>(&arguments)
            };

            match parsed {
                Ok(params) => {
                    message =
                        message.with_tool_request(id, Ok(ToolCall::new(&function_name, params)));
                }
                Err(e) => {
                    let error = AgentError::InvalidParameters(format!(
                        "Could not interpret tool use parameters for id {}: {}",
                        id, e
                    ));
                    message =
                        message.with_unparsed_tool_request(id, function_name, arguments, error);
                }
            }
        }
    }

    Ok(message)
}

/// Read token usage from a chat completion response
pub fn get_usage(data: &Value) -> Result<Usage> {
    let usage = data
        .get("usage")
        .ok_or_else(|| anyhow!("No usage data in response"))?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    Ok(Usage::new(input_tokens, output_tokens, total_tokens))
}

fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex");
    re.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex");
    re.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::Content;
    use serde_json::json;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "getWeather",
                        "arguments": "{\"cityName\": \"Paris\"}"
                    }
                }]
            }
        }],
        "usage": {
            "input_tokens": 10,
            "output_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    fn weather_tool() -> Tool {
        Tool::new(
            "getWeather",
            "Get weather by city name",
            json!({
                "type": "object",
                "properties": {
                    "cityName": {
                        "type": "string",
                        "description": "The city name"
                    }
                },
                "required": ["cityName"]
            }),
        )
    }

    #[test]
    fn test_messages_to_openai_spec() -> Result<()> {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec() -> Result<()> {
        let spec = tools_to_openai_spec(&[weather_tool()])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "getWeather");
        assert_eq!(
            spec[0]["function"]["parameters"]["required"],
            json!(["cityName"])
        );
        Ok(())
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("getWeather"));
        assert!(is_valid_function_name("hello_world"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name("hello@world"));
    }

    #[test]
    fn test_messages_to_openai_spec_with_tool_round() -> Result<()> {
        let messages = vec![
            Message::user().with_text("Weather in Paris?"),
            Message::assistant().with_tool_request(
                "call_1",
                Ok(ToolCall::new("getWeather", json!({"cityName": "Paris"}))),
            ),
            Message::tool("call_1", Ok(vec![Content::text("{\"temperature\":18}")])),
            Message::assistant().with_text("It is 18°C in Paris."),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[1]["role"], "assistant");
        assert!(spec[1]["tool_calls"].is_array());
        assert_eq!(spec[1]["tool_calls"][0]["function"]["arguments"], "{\"cityName\":\"Paris\"}");
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["content"], "{\"temperature\":18}");
        assert_eq!(spec[2]["tool_call_id"], spec[1]["tool_calls"][0]["id"]);
        assert_eq!(spec[3]["content"], "It is 18°C in Paris.");

        Ok(())
    }

    #[test]
    fn test_messages_to_openai_spec_tool_error() {
        let messages = vec![Message::tool(
            "call_9",
            Err(AgentError::ExecutionError("boom".to_string())),
        )];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "tool");
        assert_eq!(spec[0]["tool_call_id"], "call_9");
        assert!(spec[0]["content"]
            .as_str()
            .unwrap()
            .contains("Tool execution failed: boom"));
    }

    #[test]
    fn test_messages_to_openai_spec_unparsed_call_stays_paired() {
        let messages = vec![
            Message::user().with_text("Weather in Paris?"),
            Message::assistant().with_unparsed_tool_request(
                "call_1",
                "getWeather",
                "{\"cityName\": \"Par",
                AgentError::InvalidParameters("EOF while parsing".to_string()),
            ),
            Message::tool(
                "call_1",
                Err(AgentError::InvalidParameters("EOF while parsing".to_string())),
            ),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 3);
        let call = &spec[1]["tool_calls"][0];
        assert_eq!(call["id"], "call_1");
        assert_eq!(call["function"]["name"], "getWeather");
        assert_eq!(call["function"]["arguments"], "{\"cityName\": \"Par");
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["tool_call_id"], call["id"]);
    }

    #[test]
    fn test_messages_to_openai_spec_bad_name_is_sanitized() {
        let messages = vec![
            Message::assistant().with_unparsed_tool_request(
                "call_2",
                "get weather",
                "",
                AgentError::ToolNotFound("invalid characters".to_string()),
            ),
            Message::tool(
                "call_2",
                Err(AgentError::ToolNotFound("invalid characters".to_string())),
            ),
        ];

        let spec = messages_to_openai_spec(&messages);

        let call = &spec[0]["tool_calls"][0];
        assert_eq!(call["function"]["name"], "get_weather");
        assert_eq!(call["function"]["arguments"], "{}");
        assert_eq!(spec[1]["tool_call_id"], "call_2");
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() -> Result<()> {
        let result = tools_to_openai_spec(&[weather_tool(), weather_tool()]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));

        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_empty() -> Result<()> {
        let spec = tools_to_openai_spec(&[])?;
        assert!(spec.is_empty());
        Ok(())
    }

    #[test]
    fn test_create_request_optional_fields() -> Result<()> {
        let messages = vec![Message::user().with_text("Hi")];

        let bare = create_request("gpt-4o", "system", &messages, &[], None, None)?;
        assert!(bare.get("tools").is_none());
        assert!(bare.get("temperature").is_none());
        assert_eq!(bare["messages"][0]["role"], "system");
        assert_eq!(bare["messages"][1]["content"], "Hi");

        let full = create_request(
            "gpt-4o",
            "system",
            &messages,
            &[weather_tool()],
            Some(0.0),
            Some(256),
        )?;
        assert_eq!(full["tools"][0]["function"]["name"], "getWeather");
        assert_eq!(full["temperature"], json!(0.0));
        assert_eq!(full["max_tokens"], json!(256));
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_text() -> Result<()> {
        let response = json!({
            "choices": [{
                "role": "assistant",
                "message": {
                    "content": "It's sunny in Tokyo."
                }
            }]
        });

        let message = openai_response_to_message(response)?;
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.text(), "It's sunny in Tokyo.");
        assert_eq!(message.role, Role::Assistant);

        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_valid_toolrequest() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(response)?;

        assert_eq!(message.content.len(), 1);
        if let MessageContent::ToolRequest(request) = &message.content[0] {
            let tool_call = request.tool_call.as_ref().unwrap();
            assert_eq!(tool_call.name, "getWeather");
            assert_eq!(tool_call.arguments, json!({"cityName": "Paris"}));
        } else {
            panic!("Expected ToolRequest content");
        }

        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_invalid_func_name() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["name"] =
            json!("invalid fn");

        let message = openai_response_to_message(response)?;

        if let MessageContent::ToolRequest(request) = &message.content[0] {
            match &request.tool_call {
                Err(AgentError::ToolNotFound(msg)) => {
                    assert!(msg.starts_with("The provided function name"));
                }
                _ => panic!("Expected ToolNotFound error"),
            }
        } else {
            panic!("Expected ToolRequest content");
        }

        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_json_decode_error() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        let message = openai_response_to_message(response)?;

        if let MessageContent::ToolRequest(request) = &message.content[0] {
            match &request.tool_call {
                Err(AgentError::InvalidParameters(msg)) => {
                    assert!(msg.starts_with("Could not interpret tool use parameters"));
                }
                _ => panic!("Expected InvalidParameters error"),
            }
            let raw = request.raw.as_ref().unwrap();
            assert_eq!(raw.name, "getWeather");
            assert_eq!(raw.arguments, "invalid json {");
        } else {
            panic!("Expected ToolRequest content");
        }

        Ok(())
    }

    #[test]
    fn test_openai_response_without_choices() {
        let result = openai_response_to_message(json!({"choices": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_get_usage_sums_missing_total() -> Result<()> {
        let usage = get_usage(&json!({
            "usage": {"prompt_tokens": 4, "completion_tokens": 6}
        }))?;
        assert_eq!(usage.total_tokens, Some(10));
        assert!(get_usage(&json!({})).is_err());
        Ok(())
    }
}
