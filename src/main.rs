use aurora::app::AppContext;
use aurora::channels::CliChannel;
use aurora::config::AuroraConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // File logging is opt-in; the guard flushes it on exit.
    let (file_layer, _log_guard) = match std::env::var("AURORA_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "aurora.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    let config = AuroraConfig::from_env()?;

    eprintln!("🌲 {} v{}", config.agent_name, env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} @ {}", config.llm.model, config.llm.host);
    eprintln!("   Data: {}", config.data_dir.display());
    eprintln!(
        "   Learning: {}",
        if config.learning_enabled { "enabled" } else { "disabled" }
    );
    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    let app = AppContext::build(config).await?;
    let profile = app.profile.load().await?;
    let cli = CliChannel::new(profile.preferred_name);

    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
        result = app.router.run(&cli) => result?,
    }

    Ok(())
}
