//! Harbor smoke harness.
//!
//! Installs one engine version against a live origin, replays a list of
//! paths with the network up, then replays them again with the network
//! switched off, and prints a JSON summary of which tier answered each one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use harbor_common::{init_logging, LogConfig, LogFormat};
use harbor_net::{Fetcher, HttpFetcher, LoaderConfig, NetError, Request, Response, Url};
use harbor_sw::{ControlMessage, EngineConfig, MemoryCacheStorage, OfflineWorker};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "harbor-smoke", about = "Replay requests through the Harbor engine")]
struct Args {
    /// Engine config JSON; defaults are used when absent.
    #[arg(long, env = "HARBOR_CONFIG")]
    config: Option<PathBuf>,

    /// Origin to install against (overrides the config).
    #[arg(long)]
    origin: Option<Url>,

    /// Version tag (overrides the config).
    #[arg(long)]
    version: Option<String>,

    /// Log format: pretty, compact or json.
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,

    /// Log directives, e.g. `harbor_sw=debug`; overrides RUST_LOG.
    #[arg(long)]
    log_filter: Option<String>,

    /// Paths to replay. Prefix with `nav:` for a navigation request.
    paths: Vec<String>,
}

/// Fetcher whose network can be switched off.
struct Switchable {
    inner: HttpFetcher,
    offline: AtomicBool,
}

#[async_trait]
impl Fetcher for Switchable {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline);
        }
        self.inner.fetch(request).await
    }
}

fn build_request(config: &EngineConfig, entry: &str) -> anyhow::Result<Request> {
    let (navigate, path) = match entry.strip_prefix("nav:") {
        Some(path) => (true, path),
        None => (false, entry),
    };
    let url = config
        .resolve(path)
        .with_context(|| format!("cannot resolve {path}"))?;
    Ok(if navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    })
}

async fn replay(
    worker: &OfflineWorker,
    config: &EngineConfig,
    paths: &[String],
) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut results = Vec::with_capacity(paths.len());
    for entry in paths {
        let request = build_request(config, entry)?;
        let started = Instant::now();
        let mut outcome = match worker.handle_fetch(request).await {
            Ok(response) => json!({
                "path": entry,
                "status": response.status.as_u16(),
                "source": response.source.to_string(),
                "content_type": response.header("content-type"),
                "bytes": response.body().len(),
            }),
            Err(e) => {
                warn!(path = %entry, error = %e, "Request failed");
                json!({ "path": entry, "error": e.to_string() })
            }
        };
        let elapsed_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
        outcome["elapsed_ms"] = json!(elapsed_ms);
        results.push(outcome);
    }
    Ok(results)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut log_config = LogConfig::default().with_format(args.log_format);
    if let Some(ref directives) = args.log_filter {
        log_config = log_config.with_filter(directives.clone());
    }
    init_logging(log_config);

    let mut config = match args.config {
        Some(ref path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(origin) = args.origin {
        config.origin = origin;
    }
    if let Some(version) = args.version {
        config.version = version;
    }
    config.validate()?;

    let paths = if args.paths.is_empty() {
        config.precache_manifest.clone()
    } else {
        args.paths
    };

    let network = Arc::new(Switchable {
        inner: HttpFetcher::new(LoaderConfig::default())?,
        offline: AtomicBool::new(false),
    });
    let (worker, _events) =
        OfflineWorker::new(Arc::new(MemoryCacheStorage::new()), network.clone());

    info!(origin = %config.origin, version = %config.version, "Installing");
    worker
        .install(config.clone())
        .await
        .context("install failed")?;

    let online = replay(&worker, &config, &paths).await?;
    network.offline.store(true, Ordering::SeqCst);
    let offline = replay(&worker, &config, &paths).await?;

    let version = worker
        .post_message(ControlMessage::GetVersion)
        .await?
        .map(|reply| reply.version);
    let namespaces = worker.cache().namespaces().await?;

    let summary = json!({
        "version": version,
        "namespaces": namespaces,
        "online": online,
        "offline": offline,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
