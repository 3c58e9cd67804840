//! dbmi-mem-driver - in-memory DBMI driver
//!
//! Serves the DBMI protocol on stdin/stdout from a `MemoryBackend`,
//! optionally seeded from a TOML fixture. Register it in `dbmscap`:
//!
//! ```text
//! mem:dbmi-mem-driver --fixture /path/to/fixture.toml:in-memory driver
//! ```
//!
//! Logs go to stderr; stdout belongs to the protocol.

use anyhow::{Context, Result};
use clap::Parser;
use dbmi::protocol::PROTOCOL_VERSION;
use dbmi::server::{Dispatcher, Fixture, MemoryBackend};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbmi-mem-driver")]
#[command(version)]
#[command(about = "In-memory DBMI driver speaking the protocol on stdin/stdout", long_about = None)]
struct Args {
    /// TOML file with databases, tables and rows to serve
    #[arg(long, env = "DBMI_MEM_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Protocol version announced at the handshake
    #[arg(long, default_value_t = PROTOCOL_VERSION)]
    protocol_version: i32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbmi=warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let backend = match &args.fixture {
        Some(path) => {
            let fixture = Fixture::load(path)
                .with_context(|| format!("loading fixture {}", path.display()))?;
            MemoryBackend::from_fixture(&fixture)?
        }
        None => MemoryBackend::new(),
    };

    Dispatcher::new(backend)
        .with_version(args.protocol_version)
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    Ok(())
}
