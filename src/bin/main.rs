use clap::Parser;
use financial_chat_agent::{
    agent::ToolCallingLoop,
    bridge::ToolBridge,
    claude::AnthropicClient,
    config::AgentConfig,
    memory::ConversationStore,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_SESSION: &str = "cli";

#[derive(Parser, Debug)]
#[command(name = "agent", version, about = "Chat with the financial agent from the terminal")]
struct Cli {
    /// Conversation id the exchange reads and appends history under
    #[arg(long, short, default_value = DEFAULT_SESSION)]
    session: String,
    /// One-shot prompt; leave empty to start the interactive loop
    #[arg()]
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|value| value.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    // Load environment variables
    dotenv::dotenv().ok();

    // argv before config: --help and --version must not require a
    // configured environment.
    let cli = Cli::parse();
    let prompt = if cli.prompt.is_empty() {
        None
    } else {
        Some(cli.prompt.join(" "))
    };

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⚠️  Configuration error: {}", e);
            eprintln!("📌 See .env.example for setup instructions");
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }
    };

    info!(
        model = %config.model,
        session = %cli.session,
        "Financial chat agent starting"
    );

    // Create components
    let model = Arc::new(AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.model.clone(),
        config.max_tokens,
    )?);
    let bridge = Arc::new(ToolBridge::new(
        &config.mcp_server_url,
        config.mcp_auth_token.as_deref(),
    )?);
    let store = Arc::new(ConversationStore::new(config.max_history_turns));
    let agent = ToolCallingLoop::new(
        model,
        bridge.clone(),
        store,
        config.system_prompt.clone(),
    );

    // The bridge is a shared long-lived resource: connect once, close on
    // every exit path.
    bridge.connect().await?;

    let outcome = match prompt {
        Some(text) => run_once(&agent, &cli.session, &text).await,
        None => run_repl(&agent, &cli.session).await,
    };

    if let Err(e) = bridge.close().await {
        warn!("Tool bridge close failed: {}", e);
    }

    outcome
}

async fn run_once(
    agent: &ToolCallingLoop,
    session: &str,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match agent.run(session, text).await {
        Ok(answer) => {
            println!("{}", answer);
            Ok(())
        }
        Err(e) => {
            eprintln!("Exchange failed: {}", e);
            Err(Box::new(e))
        }
    }
}

async fn run_repl(
    agent: &ToolCallingLoop,
    session: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("💬 Financial chat agent ready. Ask about a ticker, or type 'exit' to quit.");

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        match agent.run(session, text).await {
            Ok(answer) => println!("\n{}\n", answer),
            Err(e) => eprintln!("Sorry, something went wrong: {}", e),
        }
    }

    println!("Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_no_args_means_default_session_and_no_prompt() {
        let cli = Cli::try_parse_from(["agent"]).unwrap();
        assert_eq!(cli.session, DEFAULT_SESSION);
        assert!(cli.prompt.is_empty());
    }

    #[test]
    fn test_session_flag_has_long_and_short_forms() {
        let long = Cli::try_parse_from(["agent", "--session", "alice"]).unwrap();
        assert_eq!(long.session, "alice");

        let short = Cli::try_parse_from(["agent", "-s", "standup"]).unwrap();
        assert_eq!(short.session, "standup");
    }

    #[test]
    fn test_positional_words_join_into_one_prompt() {
        let cli = Cli::try_parse_from(["agent", "how", "is", "AAPL", "doing"]).unwrap();
        assert_eq!(cli.prompt.join(" "), "how is AAPL doing");
        assert_eq!(cli.session, DEFAULT_SESSION);
    }

    #[test]
    fn test_session_flag_combines_with_a_prompt() {
        let cli = Cli::try_parse_from(["agent", "-s", "alice", "price", "of", "MSFT"]).unwrap();
        assert_eq!(cli.session, "alice");
        assert_eq!(cli.prompt.join(" "), "price of MSFT");
    }

    #[test]
    fn test_help_flag_renders_usage_instead_of_becoming_prompt_text() {
        let err = Cli::try_parse_from(["agent", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_session_flag_requires_a_value() {
        assert!(Cli::try_parse_from(["agent", "--session"]).is_err());
    }
}
