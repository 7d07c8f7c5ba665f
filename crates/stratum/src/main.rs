#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod discord;
pub mod node;
pub mod runner;
pub mod server;
pub mod shard_manager;
pub mod succession_watch;

use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    if let Err(err) = node::run().await {
        // §6 exit codes: 2 for a failed coordinator contact at join, 1 for
        // any other startup failure.
        let code = if err.downcast_ref::<node::CoordinatorContactFailure>().is_some() {
            2
        } else {
            1
        };
        tracing::error!(error = ?err, exit_code = code, "node exited with error");
        std::process::exit(code);
    }

    Ok(())
}

/// Initializes logging for the application.
fn init_logging() -> anyhow::Result<()> {
    let subscriber = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("stratum=trace".parse()?)
        .add_directive("crust=trace".parse()?)
        .add_directive("bedrock_core=trace".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(subscriber)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}
