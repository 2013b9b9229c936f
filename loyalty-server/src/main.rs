use loyalty_server::{Config, Server, ServerState, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 2. Logging
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    print_banner();
    tracing::info!(
        environment = %config.environment,
        policy = %config.overflow_policy,
        timezone = %config.business_timezone,
        "Loyalty server starting..."
    );

    // 3. State
    let state = ServerState::initialize(&config).await?;

    // 4. Serve
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
