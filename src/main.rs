use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ninaf::{App, Server, Settings, actions};

#[derive(Parser)]
#[command(name = "ninaf")]
#[command(about = "Serve the NINAF sample application", long_about = None)]
struct Cli {
    /// Settings file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `[server] bind`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the settings and route table, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ninaf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ninaf failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading settings");
            Settings::load(path)?
        }
        None => Settings::default(),
    };
    if let Some(bind) = cli.bind {
        settings.server.bind = bind;
    }

    let bind = settings.server.bind.clone();
    let timeout = settings.request_timeout();
    let app = App::new(settings, actions::registry())?
        .with_reverse_targets(actions::REVERSE_TARGETS);
    app.validate()?;
    info!("route table validated");

    if cli.check {
        return Ok(());
    }

    let server = Server::bind(&bind).await?.with_timeout(timeout);
    server.serve(Arc::new(app)).await?;
    Ok(())
}
