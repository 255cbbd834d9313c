use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use formpilot::{Browser, FillRunner, RunConfig, RunOptions};
use tracing_subscriber::EnvFilter;

/// Fill and submit the form at the configured URL, correcting values from
/// the page's validation messages.
#[derive(Debug, Parser)]
#[command(name = "formpilot", version)]
struct Cli {
    /// Target config (JSON with url, allowlist, assertions)
    #[arg(short, long, default_value = "config/target.json")]
    config: PathBuf,

    /// Directory for before.png, after.png and log.json
    #[arg(short, long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// Extra submit attempts after the first one
    #[arg(long, default_value_t = formpilot::config::DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Wait budget for the success selector, in milliseconds
    #[arg(long, default_value_t = 5000)]
    assert_timeout_ms: u64,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Chrome/Chromium executable
    #[arg(long)]
    chrome: Option<String>,

    /// Seed for reproducible values
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> formpilot::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formpilot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RunConfig::from_file(&cli.config)?;

    let options = RunOptions::default()
        .artifacts_dir(cli.artifacts)
        .max_retries(cli.max_retries)
        .assertion_timeout(Duration::from_millis(cli.assert_timeout_ms));

    let mut builder = Browser::builder().headless(!cli.headed);
    if let Some(path) = cli.chrome {
        builder = builder.chrome_path(path);
    }

    let mut runner = match cli.seed {
        Some(seed) => FillRunner::seeded(options, seed),
        None => FillRunner::new(options),
    };
    let log = runner.run(&config, builder.build_config()).await?;

    println!("{}", serde_json::to_string_pretty(&log)?);
    Ok(())
}
