use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

use shellcache_core::cache::{CacheStorage, CachedEntry, FileStorage};
use shellcache_core::net::{HttpFetcher, Request};
use shellcache_core::strategy::RouteOutcome;
use shellcache_core::update::{
    CheckOutcome, DocumentVersionSource, FileLocalState, PersistedUpdate,
    RemoteVersionSource, UpdateController, UpdateOrchestrator, UpdateScheduler, UpdateState,
    VersionPoller, VersionSource,
};
use shellcache_core::{BackgroundWorker, ShellConfig};

use crate::cli::FetchArgs;
use crate::host::{ConsoleClients, ConsoleNavigator, ConsoleNotifications};

/// Everything the subcommands share, built once from the config.
pub struct Engine {
    config: ShellConfig,
    storage: Arc<FileStorage>,
    fetcher: Arc<HttpFetcher>,
    local: Arc<FileLocalState>,
}

impl Engine {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ShellConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ShellConfig::load().context("Failed to load config")?,
        };
        config.validate().context("Invalid config")?;

        let dir: PathBuf = config.storage_dir().context("No storage directory")?;
        let storage = FileStorage::new(dir.join("caches"))
            .with_context(|| format!("Failed to open cache store in {}", dir.display()))?;
        let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
        let local = FileLocalState::new(dir);
        debug!(origin = %config.origin, tag = %config.cache.version_tag, "Engine loaded");

        Ok(Self {
            config,
            storage: Arc::new(storage),
            fetcher: Arc::new(fetcher),
            local: Arc::new(local),
        })
    }

    async fn worker(&self) -> Result<BackgroundWorker> {
        let worker = BackgroundWorker::new(
            &self.config,
            self.storage.clone(),
            self.fetcher.clone(),
            Arc::new(ConsoleClients),
            Arc::new(ConsoleNotifications),
        )
        .context("Failed to build worker")?;
        let state = worker.resume().await.context("Failed to read cache store")?;
        debug!(%state, "Worker resumed");
        Ok(worker)
    }

    fn controller(&self) -> Arc<UpdateController> {
        let persisted = PersistedUpdate::load(self.local.as_ref());
        Arc::new(UpdateController::new(UpdateState::initial(
            &self.config.update.app_version,
            &persisted,
        )))
    }

    fn poller(&self, controller: Arc<UpdateController>) -> Result<VersionPoller> {
        let primary = self.config.update.remote.clone().map(|remote| {
            Arc::new(RemoteVersionSource::new(self.fetcher.client().clone(), remote))
                as Arc<dyn VersionSource>
        });
        let document = self
            .config
            .resolve(&self.config.update.metadata_path)
            .context("Invalid version metadata path")?;
        let fallback = Arc::new(DocumentVersionSource::new(self.fetcher.clone(), document));

        Ok(VersionPoller::new(
            controller,
            primary,
            fallback,
            self.local.clone(),
            self.config.update.check_interval(),
        ))
    }

    fn location(&self, location: Option<Url>) -> Url {
        location.unwrap_or_else(|| self.config.origin.clone())
    }
}

pub fn run_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => ShellConfig::config_path().context("No config directory")?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = ShellConfig::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.validate().context("Invalid config")?;
    match config_path {
        Some(path) => config.save_to(path),
        None => config.save(),
    }
    .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {}", path.display());
    Ok(())
}

pub async fn run_install(engine: &Engine) -> Result<()> {
    let worker = engine.worker().await?;
    let report = worker.install().await.context("Install failed")?;
    println!("Installed {} entries into {}", report.entries, report.generation);
    Ok(())
}

pub async fn run_activate(engine: &Engine) -> Result<()> {
    let worker = engine.worker().await?;
    let deleted = worker.activate().await.context("Activation failed")?;
    if deleted.is_empty() {
        println!("No stale generations");
    } else {
        for name in deleted {
            println!("Deleted {name}");
        }
    }
    Ok(())
}

pub async fn run_fetch(engine: &Engine, args: &FetchArgs) -> Result<()> {
    let url = engine
        .config
        .resolve(&args.url)
        .with_context(|| format!("Invalid URL: {}", args.url))?;
    let request = if args.navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    };
    let request = request.with_method(args.method.as_str());

    let worker = engine.worker().await?;
    match worker.fetch(&request).await {
        RouteOutcome::Passthrough => println!("passthrough (not intercepted)"),
        RouteOutcome::Handled { strategy, served } => {
            println!(
                "{} {} via {} from {} ({} bytes)",
                served.response.status,
                served.response.status_text,
                strategy,
                served.source,
                served.response.body.len()
            );
        }
    }
    Ok(())
}

pub async fn run_status(engine: &Engine) -> Result<()> {
    let generations = engine.config.generations();
    let stored = engine
        .storage
        .generations()
        .await
        .context("Failed to list cache generations")?;

    println!("Cache store: {}", engine.storage.root().display());
    if stored.is_empty() {
        println!("  (empty)");
    }
    for name in &stored {
        let keys = engine.storage.keys(name).await?;
        let mut entries: Vec<CachedEntry> = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(entry) = engine.storage.get(name, key).await? {
                entries.push(entry);
            }
        }
        let newest = entries.into_iter().max_by_key(|e| e.cached_at);
        let marker = if generations.contains(name) { "*" } else { " " };
        let age = newest.map(|e| e.age_display()).unwrap_or_else(|| "-".to_string());
        println!("{marker} {name:<20} {:>5} entries  newest {age}", keys.len());
    }

    let state = engine.controller().snapshot();
    println!();
    println!("Version:     {}", state.current_version);
    if let Some(ref latest) = state.latest_version {
        println!("Latest:      {}", latest.version);
    }
    println!("Phase:       {}", state.phase());
    match state.last_check {
        Some(at) => println!("Last check:  {}", at.to_rfc3339()),
        None => println!("Last check:  never"),
    }
    if let Some(at) = PersistedUpdate::load(engine.local.as_ref()).last_update {
        println!("Last update: {}", at.to_rfc3339());
    }
    Ok(())
}

pub async fn run_check(engine: &Engine, force: bool) -> Result<()> {
    let poller = engine.poller(engine.controller())?;
    match poller.check_for_updates(force).await {
        Ok(CheckOutcome::Skipped(reason)) => println!("Skipped: {reason}"),
        Ok(CheckOutcome::UpToDate(record)) => println!("Up to date ({})", record.version),
        Ok(CheckOutcome::UpdateAvailable(record)) => {
            println!(
                "Update available: {} -> {}",
                poller.controller().snapshot().current_version,
                record.version
            );
            if let Some(notes) = record.release_notes {
                println!("  {notes}");
            }
        }
        Err(e) => bail!("{} ({e})", e.user_message()),
    }
    Ok(())
}

pub async fn run_apply(engine: &Engine, location: Option<Url>) -> Result<()> {
    let navigator = Arc::new(ConsoleNavigator::new(engine.location(location)));
    let orchestrator = UpdateOrchestrator::new(
        engine.controller(),
        engine.storage.clone(),
        engine.local.clone(),
        navigator,
    );
    match orchestrator.apply_update().await {
        Ok(url) => {
            info!(url = %url, "Update applied");
            Ok(())
        }
        Err(e) => bail!("{} ({e})", e.user_message()),
    }
}

pub async fn run_push(engine: &Engine, payload: &str) -> Result<()> {
    let worker = engine.worker().await?;
    let shown = worker.push(Some(payload.as_bytes())).await;
    let outcome = worker.notification_click(&shown).await;
    println!("route: {} ({:?})", outcome.route.url, outcome.delivery);
    Ok(())
}

pub async fn run_watch(engine: &Engine, location: Option<Url>) -> Result<()> {
    let controller = engine.controller();
    let poller = Arc::new(engine.poller(controller.clone())?);
    let navigator = Arc::new(ConsoleNavigator::new(engine.location(location)));
    let scheduler = UpdateScheduler::new(poller, navigator, engine.config.update.initial_delay());

    let (focus_tx, focus_rx) = mpsc::channel(8);
    let handle = scheduler.spawn(focus_rx);

    let mut changes = controller.subscribe();
    let printer = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            println!("{} ({})", state.phase(), state.current_version);
        }
    });

    println!("Watching for updates; press enter to signal focus, Ctrl-D to stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while lines.next_line().await.context("Failed to read stdin")?.is_some() {
        if focus_tx.send(()).await.is_err() {
            break;
        }
    }
    drop(focus_tx);

    handle.await.context("Update scheduler panicked")?;
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_and_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shellcache").join("config.json");

        run_init(Some(&path), false).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n  \"origin\""));
        assert!(ShellConfig::load_from(&path).unwrap().validate().is_ok());

        let err = run_init(Some(&path), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        run_init(Some(&path), true).unwrap();
    }
}
