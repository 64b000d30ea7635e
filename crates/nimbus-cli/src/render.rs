use anyhow::Result;
use bat::WrappingMode;
use nimbus::models::message::{Message, MessageContent};
use std::io::{self, Write};

const THEME: &str = "zenburn";

fn print_tool_request(content: &str, tool_name: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes()).name(format!("Tool Request: {}", tool_name)),
        )
        .theme(THEME)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

fn print_tool_response(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name("Tool Response:"))
        .theme(THEME)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

fn print(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

/// Pretty-print a tool payload when it is JSON, pass anything else through
fn pretty_json(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| text.to_string())
}

/// Render a message produced during a turn
pub fn render(message: &Message, verbose: bool) -> Result<()> {
    for content in &message.content {
        match content {
            MessageContent::Text(text) if !text.text.is_empty() => print(&text.text)?,
            MessageContent::Text(_) => {}
            MessageContent::ToolRequest(request) if verbose => match &request.tool_call {
                Ok(call) => print_tool_request(&pretty_json(&call.arguments.to_string()), &call.name)?,
                Err(e) => print(&e.to_string())?,
            },
            MessageContent::ToolResponse(response) if verbose => match &response.tool_result {
                Ok(_) => {
                    let text = content.as_tool_response_text().unwrap_or_default();
                    print_tool_response(&pretty_json(&text))?
                }
                Err(e) => print(&e.to_string())?,
            },
            _ => {}
        }
    }

    io::stdout().flush()?;
    Ok(())
}
