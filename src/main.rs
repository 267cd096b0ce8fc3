//! dlog - main entry point.

use std::sync::Arc;

use clap::Parser;

use dlog::{
    cache::TempCache,
    cli::Cli,
    config::Config,
    diagnostics::CountingAlloc,
    logging,
    session::Session,
    source::{DockerSource, LogSource},
};

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    logging::init(&config)?;

    tracing::info!(
        tail = %config.tail,
        all = config.all_containers,
        "Starting dlog v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Connect before the pager takes over the terminal so errors print cleanly
    let source = match DockerSource::connect(config.source_options()).await {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to connect log source: {}", e);
            return Err(e.into());
        }
    };
    let source: Arc<dyn LogSource> = Arc::new(source);

    let session =
        Session::new(source, config.tail).with_caches(TempCache::new(&config.cache_dir));

    // The pager blocks on terminal input; keep it off the runtime workers
    let (mut session, result) = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let result = session.start();
        (session, result)
    })
    .await?;

    session.shutdown();

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => {
            eprintln!("dlog: {e}");
            eprintln!("See {} for details", config.log_file.display());
            drop(session);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Session failed: {}", e);
            Err(e.into())
        }
    }
}
