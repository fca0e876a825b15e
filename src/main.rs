//! Serve cached user lookups over HTTP.
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use readthrough::cache::{Cache, KeyedCache, ReadThrough};
use readthrough::config::{CacheStrategy, Config};
use readthrough::resolver::FanOutResolver;
use readthrough::service::UserService;
use readthrough::store::{MockStore, User};
use readthrough::{Router, Server, ServerError, logging};

#[derive(Parser)]
#[command(version, about = "Read-through cached user lookups over HTTP.")]
struct Args {
    #[arg(short, long, help = "Optional path to a config TOML.")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Address to listen on, overriding the config file.")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Tracing is not up yet, so configuration errors go to stderr.
    let mut config = Config::load(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Err(errors) = config.validate() {
        eprintln!("Configuration is invalid.");
        for msg in &errors {
            eprintln!(" - {msg}");
        }
        std::process::exit(1);
    }

    if let Err(e) = logging::init(&config.log_filter) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let result = match config.cache.strategy {
        CacheStrategy::Locked => serve(Cache::<i64, User>::new(), &config).await,
        CacheStrategy::Keyed => serve(KeyedCache::<i64, User>::new(), &config).await,
    };
    if let Err(e) = result {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

async fn serve<C>(cache: C, config: &Config) -> Result<(), ServerError>
where
    C: ReadThrough<i64, User> + 'static,
{
    let mut resolver = FanOutResolver::new(Arc::new(cache));
    if let Some(deadline) = config.resolver.deadline() {
        resolver = resolver.with_deadline(deadline);
    }
    let store = Arc::new(MockStore::seeded(config.store.latency()));

    info!(
        strategy = ?config.cache.strategy,
        latency = ?store.latency(),
        deadline = ?resolver.deadline(),
        "starting user service"
    );

    let mut router = Router::new();
    Arc::new(UserService::new(resolver, store)).mount(&mut router);
    let router = Arc::new(router);

    let server = Server::bind(&config.listen).await?;
    server
        .run_until(
            move |req| {
                let router = Arc::clone(&router);
                async move { router.route(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await
}
