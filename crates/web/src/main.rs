use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jasper_common::GetterConfig;
use jasper_portal::SimDataService;

#[derive(Parser)]
#[command(name = "jasper-web")]
#[command(about = "HTTP endpoint for SIM card lookups")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JASPER_CONFIG", default_value = "jasper.toml")]
    config: PathBuf,

    /// Directory holding accounts, templates and session documents
    #[arg(long, env = "JASPER_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// HTTP listen address
    #[arg(short, long, env = "JASPER_LISTEN")]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = GetterConfig::load(&cli.config)?;
    if let Some(dir) = cli.config_dir {
        config.config_dir = dir;
    }
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    init_tracing(cli.debug, &config)?;

    let addr: SocketAddr = config.listen.parse()?;
    let service = SimDataService::from_config(&config)?;

    info!(
        "Starting Jasper Getter {} (config dir: {})",
        jasper_common::VERSION,
        config.config_dir.display()
    );

    jasper_web::serve(addr, service).await
}

/// Log to stderr, and to `log_file` as well when one is configured.
fn init_tracing(debug: bool, config: &GetterConfig) -> anyhow::Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_layer = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log_file has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // Flushes the file writer on exit
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}
