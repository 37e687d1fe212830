//! apiforge-mock - standalone mock server entry point

use anyhow::Result;
use apiforge::{MockServer, RuleSet};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "apiforge-mock",
    about = "Standalone mock HTTP server replaying declarative rule files",
    version
)]
struct Args {
    /// Path to the rule file
    #[arg(short, long, default_value = "mock-rules.yaml")]
    rules: PathBuf,

    /// Listen host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port (0 picks an ephemeral port)
    #[arg(short, long, default_value_t = 8888)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Validate the rule file and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load the rule file
    let rules = if args.rules.exists() {
        info!(path = ?args.rules, "loading rule file");
        RuleSet::from_file(&args.rules)?
    } else if args.validate {
        anyhow::bail!("rule file not found: {:?}", args.rules);
    } else {
        info!("no rule file found, starting with an empty rule set");
        RuleSet::default()
    };

    // Validate and exit if requested
    if args.validate {
        rules.validate()?;
        println!("Rule file is valid ({} rules defined)", rules.len());
        return Ok(());
    }

    let mut server = MockServer::new(args.host, args.port);
    server.mount_rules(rules);
    server.start().await?;
    info!(url = %server.base_url(), "mock server ready, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    server.stop().await?;

    Ok(())
}
