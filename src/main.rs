use bfi_signals::api;
use bfi_signals::config::Config;
use bfi_signals::services::{pipeline, scheduler};
use bfi_signals::AppState;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hybrid Math trading signals: dashboard server and one-shot tasks.
#[derive(Parser, Debug)]
#[command(name = "bfi-signals", version, about)]
struct Cli {
    /// Probe the Discord webhook and exit
    #[arg(long, conflicts_with = "generate")]
    test_connection: bool,

    /// Run the signal pipeline once and exit
    #[arg(long)]
    generate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bfi_signals=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let state = AppState::new(config)?;

    if cli.test_connection {
        if state.notifier.discord().test_connection().await {
            info!("Discord webhook reachable");
            return Ok(());
        }
        error!("Discord webhook test failed");
        std::process::exit(1);
    }

    if cli.generate {
        let report = pipeline::generate_signals(&state, &state.config.trading_symbols).await;
        info!(
            "Generated {} signal(s), average probability {:.1}%",
            report.signals.len(),
            report.average_probability
        );
        if report.signals.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    serve(state).await
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    if state.auth.ensure_default_admin()? {
        warn!("Created default admin account; change its password");
    }

    let _scheduler = scheduler::spawn(state.clone());

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = api::app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("BFI Signals listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_flags() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["bfi-signals"]).unwrap();
        assert!(!cli.test_connection && !cli.generate);

        assert!(Cli::try_parse_from(["bfi-signals", "--generate"]).unwrap().generate);
        assert!(Cli::try_parse_from(["bfi-signals", "--test-connection"]).unwrap().test_connection);
        assert!(Cli::try_parse_from(["bfi-signals", "--bogus"]).is_err());
        assert!(Cli::try_parse_from(["bfi-signals", "--generate", "--test-connection"]).is_err());
    }
}
