use financial_chat_agent::{
    agent::ToolCallingLoop,
    api::start_server,
    bridge::ToolBridge,
    claude::AnthropicClient,
    config::AgentConfig,
    memory::ConversationStore,
};
use std::sync::Arc;
use tracing::{info, warn};

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

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⚠️  Configuration error: {}", e);
            eprintln!("📌 See .env.example for setup instructions");
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }
    };

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8081".to_string())
        .parse()?;

    info!("🚀 Financial Chat Agent - API Server");
    info!("📍 Port: {}", api_port);

    // Create components
    let model = Arc::new(AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.model.clone(),
        config.max_tokens,
    )?);
    info!("🤖 Model: {}", model.model());
    let bridge = Arc::new(ToolBridge::new(
        &config.mcp_server_url,
        config.mcp_auth_token.as_deref(),
    )?);
    let store = Arc::new(ConversationStore::new(config.max_history_turns));
    let agent = Arc::new(ToolCallingLoop::new(
        model,
        bridge.clone(),
        store.clone(),
        config.system_prompt.clone(),
    ));

    bridge.connect().await?;
    info!("✅ Tool bridge connected");
    info!("📡 Starting API server...");

    // Serve until shutdown, then release the bridge on every exit path.
    let result = start_server(agent, bridge.clone(), store, api_port).await;

    if let Err(e) = bridge.close().await {
        warn!("Tool bridge close failed: {}", e);
    }

    result
}
