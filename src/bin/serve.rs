//! specpilot JSON-lines server entry point
//!
//! Run with: specpilot-serve
//!
//! Reads one JSON request per line on stdin and writes one JSON response per line on stdout.
//! Configuration comes from `SPECPILOT_*` environment variables.

use specpilot::config::PilotConfig;
use specpilot::orchestrator::Orchestrator;
use specpilot::serve::StdioServer;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let config = PilotConfig::from_env()?;
    let server = StdioServer::new(Orchestrator::new(config)?);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    server
        .serve(stdin, stdout)
        .await
        .map_err(|e| miette::miette!("stdio transport failed: {e}"))?;
    Ok(())
}
