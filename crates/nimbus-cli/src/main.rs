mod render;

use anyhow::{Context, Result};
use clap::Parser;
use cliclack::{input, spinner};
use console::style;
use dotenv::dotenv;
use futures::StreamExt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use nimbus::agent::Agent;
use nimbus::providers::configs::ProviderConfig;
use nimbus::providers::factory::get_provider;
use nimbus::weather::{WeatherConfig, WeatherProvider, WeatherTool};

#[derive(Parser)]
#[command(author, version, about = "Ask about the weather", long_about = None)]
struct Cli {
    /// Session id to continue (a new one is generated by default)
    #[arg(short, long)]
    session: Option<String>,

    /// Model to use instead of OPENAI_MODEL / OLLAMA_MODEL
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature instead of MODEL_TEMPERATURE
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Show tool requests and responses
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, PartialEq)]
enum Input {
    Exit,
    Help,
    Empty,
    Message(String),
}

fn parse_input(text: &str) -> Input {
    let text = text.trim();
    if text.is_empty() {
        Input::Empty
    } else if ["exit", "/exit", "/quit"]
        .iter()
        .any(|command| text.eq_ignore_ascii_case(command))
    {
        Input::Exit
    } else if text == "/?" {
        Input::Help
    } else {
        Input::Message(text.to_string())
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_agent(cli: &Cli) -> Result<Agent> {
    let mut config = ProviderConfig::from_env().context("Invalid model configuration")?;
    if let Some(model) = &cli.model {
        config = config.with_model(model);
    }
    if let Some(temperature) = cli.temperature {
        config = config.with_temperature(temperature);
    }
    let tier = config.tier();
    let provider = get_provider(config)?;

    let weather = WeatherProvider::new(WeatherConfig::from_env())
        .context("Invalid weather configuration")?;

    Ok(Agent::new(provider, WeatherTool::new(Arc::new(weather))).with_tier(tier))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let agent = build_agent(&cli)?;
    let session_id = cli
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::debug!("Starting session {}", session_id);

    println!(
        "nimbus weather chat {}",
        style("- type \"exit\" to end the session, \"/?\" for help").dim()
    );
    println!("{}", style(format!("session {}", session_id)).dim());
    println!();

    loop {
        let text: String = input("Ask about the weather:").placeholder("").interact()?;

        let message_text = match parse_input(&text) {
            Input::Exit => break,
            Input::Empty => continue,
            Input::Help => {
                println!("exit - End the session");
                println!("/? - Display this help message");
                println!("Set RUST_LOG=debug for routing details");
                continue;
            }
            Input::Message(message_text) => message_text,
        };

        let spin = spinner();
        spin.start("awaiting reply");

        let mut stream = agent.reply(&session_id, &message_text, vec![]).await?;
        let mut first = true;
        while let Some(message) = stream.next().await {
            if first {
                spin.stop("");
                first = false;
            }
            match message {
                Ok(message) => render::render(&message, cli.verbose)?,
                Err(e) => {
                    eprintln!("{} {:#}", style("error:").red(), e);
                    break;
                }
            }
        }
        if first {
            spin.stop("");
        }

        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("exit"), Input::Exit);
        assert_eq!(parse_input(" /QUIT "), Input::Exit);
        assert_eq!(parse_input("/?"), Input::Help);
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(
            parse_input(" Weather in Paris? "),
            Input::Message("Weather in Paris?".to_string())
        );
    }

    #[test]
    fn test_cli_args() {
        let cli = Cli::parse_from(["nimbus", "--session", "abc", "-t", "0.5", "-v"]);
        assert_eq!(cli.session.as_deref(), Some("abc"));
        assert_eq!(cli.temperature, Some(0.5));
        assert!(cli.verbose);
        assert!(cli.model.is_none());
    }
}
