use crate::{IndexerError, MapIndexer, MapUpdate, Result};
use log::{debug, error, info, warn};
use notify::event::{CreateKind, EventKind};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct WatcherHealth {
    pub running: bool,
    pub watching: bool,
    pub processed: usize,
    pub failures: usize,
    pub pending: usize,
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
}

impl WatcherHealth {
    const fn initial() -> Self {
        Self {
            running: true,
            watching: true,
            processed: 0,
            failures: 0,
            pending: 0,
            last_success: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StreamingIndexerConfig {
    /// Delay between a creation event and indexing, so writers can finish.
    pub debounce: Duration,
    pub notify_poll_interval: Duration,
    /// Index the files already in the root before handling live events.
    pub scan_existing: bool,
}

impl Default for StreamingIndexerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            notify_poll_interval: Duration::from_secs(2),
            scan_existing: true,
        }
    }
}

/// Background worker that feeds new files in the watch root to
/// [`MapIndexer::update`], one at a time.
///
/// The startup scan and live creation events share the same worker task, so
/// updates never overlap. Dropping the last handle stops the worker.
#[derive(Clone)]
pub struct StreamingIndexer {
    inner: Arc<StreamingIndexerInner>,
}

struct StreamingIndexerInner {
    indexer: Arc<MapIndexer>,
    command_tx: mpsc::Sender<WatcherCommand>,
    health_tx: watch::Sender<WatcherHealth>,
    worker: TokioMutex<Option<JoinHandle<()>>>,
}

enum WatcherCommand {
    Shutdown,
}

impl StreamingIndexer {
    pub fn start(indexer: Arc<MapIndexer>, config: StreamingIndexerConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(4);
        let (health_tx, _) = watch::channel(WatcherHealth::initial());

        let watcher = create_fs_watcher(indexer.root(), event_tx, config.notify_poll_interval)?;
        info!("Watching directory: {}", indexer.root().display());

        let worker = spawn_index_loop(
            indexer.clone(),
            config,
            watcher,
            event_rx,
            command_rx,
            health_tx.clone(),
        );

        Ok(Self {
            inner: Arc::new(StreamingIndexerInner {
                indexer,
                command_tx,
                health_tx,
                worker: TokioMutex::new(Some(worker)),
            }),
        })
    }

    #[must_use]
    pub fn indexer(&self) -> &Arc<MapIndexer> {
        &self.inner.indexer
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<MapUpdate> {
        self.inner.indexer.subscribe_updates()
    }

    #[must_use]
    pub fn health_snapshot(&self) -> WatcherHealth {
        self.inner.health_tx.borrow().clone()
    }

    #[must_use]
    pub fn health_stream(&self) -> watch::Receiver<WatcherHealth> {
        self.inner.health_tx.subscribe()
    }

    /// Stops the watcher and waits for the in-flight update, if any, to finish.
    pub async fn shutdown(&self) -> Result<()> {
        // the worker may already be gone after a watcher failure
        let _ = self.inner.command_tx.send(WatcherCommand::Shutdown).await;
        let handle = self.inner.worker.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| IndexerError::Other(format!("join watcher task: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for StreamingIndexer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
    watcher
        .watch(root, RecursiveMode::NonRecursive)
        .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

/// `watcher` is only held for the life of the loop and dropped on exit.
fn spawn_index_loop<W: Send + 'static>(
    indexer: Arc<MapIndexer>,
    config: StreamingIndexerConfig,
    watcher: W,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    health_tx: watch::Sender<WatcherHealth>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending = PendingFiles::new(config.debounce);
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        if config.scan_existing {
            match indexer.scan_existing() {
                Ok(files) => queue.extend(files),
                Err(err) => error!("Error processing existing files: {err}"),
            }
            health_tx.send_modify(|h| h.pending = queue.len());
        }

        loop {
            let next_deadline = pending.next_deadline();

            tokio::select! {
                biased;

                cmd = command_rx.recv() => {
                    match cmd {
                        Some(WatcherCommand::Shutdown) | None => {
                            info!("Shutdown requested; stopping watcher");
                            break;
                        }
                    }
                }
                event = event_rx.recv() => {
                    match event {
                        Some(Ok(evt)) => {
                            if pending.record_event(&indexer, &evt) {
                                health_tx.send_modify(|h| h.pending = pending.len() + queue.len());
                            }
                        }
                        Some(Err(err)) => {
                            error!("Watcher failure, stopping background indexing: {err}");
                            health_tx.send_modify(|h| h.last_error = Some(err.to_string()));
                            break;
                        }
                        None => {
                            warn!("Watcher event channel closed");
                            break;
                        }
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => {
                    queue.extend(pending.take_ready(Instant::now()));
                }
                () = std::future::ready(()), if !queue.is_empty() => {
                    if let Some(path) = queue.pop_front() {
                        process_file(&indexer, &path, &health_tx).await;
                        health_tx.send_modify(|h| h.pending = pending.len() + queue.len());
                    }
                }
            }
        }

        drop(watcher);
        health_tx.send_modify(|h| {
            h.running = false;
            h.watching = false;
        });
        info!("Watcher stopped");
    })
}

async fn process_file(
    indexer: &MapIndexer,
    path: &Path,
    health_tx: &watch::Sender<WatcherHealth>,
) {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        debug!("Skipping non-file path {}", path.display());
        return;
    }
    if indexer.is_indexed(path).await {
        debug!("Already indexed: {}", path.display());
        return;
    }

    match indexer.update(path).await {
        Ok(update) => {
            debug!(
                "Indexed {} in {}ms ({} documents)",
                update.stats.path, update.stats.duration_ms, update.stats.documents
            );
            health_tx.send_modify(|h| {
                h.processed += 1;
                h.last_success = Some(SystemTime::now());
                h.last_error = None;
            });
        }
        Err(err) => {
            error!("Failed to index {}: {err}", path.display());
            health_tx.send_modify(|h| {
                h.failures += 1;
                h.last_error = Some(err.to_string());
            });
        }
    }
}

/// Created files waiting out the debounce window, in arrival order.
struct PendingFiles {
    debounce: Duration,
    entries: VecDeque<(PathBuf, Instant)>,
}

impl PendingFiles {
    fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            entries: VecDeque::new(),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Queues newly created files directly under the root; returns whether
    /// anything was queued.
    fn record_event(&mut self, indexer: &MapIndexer, evt: &Event) -> bool {
        if !matches!(evt.kind, EventKind::Create(CreateKind::File | CreateKind::Any)) {
            return false;
        }
        let mut queued = false;
        for path in &evt.paths {
            if path.parent() != Some(indexer.root()) || indexer.is_excluded(path) {
                continue;
            }
            queued |= self.record_path(path.clone(), Instant::now());
        }
        queued
    }

    fn record_path(&mut self, path: PathBuf, now: Instant) -> bool {
        if self.entries.iter().any(|(queued, _)| queued == &path) {
            return false;
        }
        self.entries.push_back((path, now));
        true
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.entries.front().map(|(_, seen)| *seen + self.debounce)
    }

    fn take_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready = Vec::new();
        while let Some((_, seen)) = self.entries.front() {
            if *seen + self.debounce > now {
                break;
            }
            if let Some((path, _)) = self.entries.pop_front() {
                ready.push(path);
            }
        }
        ready
    }
}
