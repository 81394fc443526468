//! # Wayline - Navigation Engine Tooling
//!
//! The developer binary for the Wayline navigation-state engine.
//!
//! ## Usage
//!
//! ```bash
//! # Edit script between two stacks
//! wayline diff --from home,feed,post --to home,post,comments
//!
//! # Replay a navigation script
//! wayline replay flows/login.toml --json
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayline::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // WAYLINE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("WAYLINE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wayline=info,wayline_core=info".into());

    // Logs go to stderr so stdout stays parseable in --json mode.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  wayline v{}
  stacks . redirects . guards . minimal diffs
"#,
        env!("CARGO_PKG_VERSION")
    );
}
