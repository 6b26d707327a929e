use reelcache::cli::Args;
use reelcache::config::CacheConfig;
use reelcache::core::{
    BufferReadinessMonitor, CacheSnapshot, CatalogCoverage, IdlePreloadScheduler, ResourceCache,
    ResourceFailed, WindowedPrefetchPolicy,
};
use reelcache::entities::{CatalogIndex, FileLoader, ResourceKey};
use reelcache::paths::{CONFIG_FILE, LOG_FILE, PathConfig};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Printed to stdout as pretty JSON
#[derive(Debug, Serialize)]
struct Report {
    current: Option<ResourceKey>,
    /// Current item had enough buffer before the timeout
    ready: bool,
    neighbour: Option<ResourceKey>,
    window: Vec<ResourceKey>,
    idle_submitted: usize,
    failures: Vec<String>,
    coverage: CatalogCoverage,
    cache: CacheSnapshot,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = PathConfig::from_env_and_cli(args.config_dir.clone());

    init_logging(&args, &paths)?;
    info!("reelcache {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let config = load_config(&args, &paths)?;
    let catalog = build_catalog(&args)?;
    info!("Catalog: {} items, current {:?}", catalog.len(), catalog.current());

    let cache = ResourceCache::new(config, FileLoader::new())?;

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    cache.events().subscribe::<ResourceFailed, _>(move |e| {
        sink.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{}: {}", e.key, e.error));
    });

    let policy = WindowedPrefetchPolicy::from_config(cache.config());
    let plan = policy.prefetch(&cache, &catalog, args.direction);

    let monitor = BufferReadinessMonitor::new(cache.clone());
    let current = catalog.current_key().cloned();
    let ready = match &current {
        Some(key) => monitor.ensure_ready_default(key.clone()).wait(),
        None => false,
    };
    info!("Current item ready: {}", ready);

    let idle_submitted = match args.watch_ms {
        Some(ms) => {
            let scheduler = IdlePreloadScheduler::new(cache.clone(), catalog.clone());
            std::thread::sleep(Duration::from_millis(ms));
            scheduler.submitted()
        }
        None => 0,
    };

    let report = Report {
        current,
        ready,
        neighbour: plan.neighbour,
        window: plan.window.into_iter().collect(),
        idle_submitted,
        failures: failures.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        coverage: cache.coverage(&catalog),
        cache: cache.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Verbosity ladder: 0 = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ = trace
fn init_logging(args: &Args, paths: &PathConfig) -> Result<()> {
    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let Some(log_path_opt) = &args.log_file else {
        // Console logging (respects RUST_LOG if set)
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
        return Ok(());
    };

    if let Err(e) = paths.ensure_dirs() {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    let log_path = log_path_opt
        .clone()
        .unwrap_or_else(|| paths.data_file(LOG_FILE));
    let file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

    let level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();

    info!("Logging to file: {} (level: {:?})", log_path.display(), level);
    Ok(())
}

/// `--config` if given, else `reelcache.json` from the config dir if present, else defaults.
fn load_config(args: &Args, paths: &PathConfig) -> Result<CacheConfig> {
    if let Some(path) = &args.config {
        return CacheConfig::load(path);
    }
    let path = paths.config_file(CONFIG_FILE);
    if path.exists() {
        info!("Using config: {}", path.display());
        return CacheConfig::load(&path);
    }
    Ok(CacheConfig::default())
}

fn build_catalog(args: &Args) -> Result<CatalogIndex> {
    let mut files = args.files.clone();

    if let Some(playlist) = &args.playlist {
        let json = std::fs::read_to_string(playlist)
            .with_context(|| format!("Failed to read playlist: {}", playlist.display()))?;
        let listed: Vec<PathBuf> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse playlist: {}", playlist.display()))?;
        files.extend(listed);
    }

    if files.is_empty() {
        bail!("No input files: pass FILE arguments or --playlist");
    }

    let keys = files
        .iter()
        .map(|path| ResourceKey::new(path.to_string_lossy()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut catalog = CatalogIndex::new(keys);
    if !catalog.set_current(args.index) {
        bail!("Index {} out of range (catalog has {} items)", args.index, catalog.len());
    }
    Ok(catalog)
}
