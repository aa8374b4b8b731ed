//! Background refresh engine.
//!
//! Each source is rebuilt as a unit: a refresh scans it, builds its
//! snapshots on the blocking pool, and publishes them to the registry.
//! A per-source async mutex makes builds single-flight, and a pending flag
//! coalesces requests that arrive mid-build: every caller of
//! [`RefreshEngine::refresh`] returns only after a build that started no
//! earlier than its request, but N concurrent callers share one build.
//!
//! A failed scan publishes nothing; readers keep the previous snapshots and
//! the failure is reported to the caller (or logged, for background
//! triggers). Staleness beats unavailability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pier_digest::{DigestAlgorithm, DigestCache};
use pier_scan::{ScanError, ScanSource};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::builder::IndexBuilder;
use crate::registry::Registry;

/// How scanned artifacts become records.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Digest algorithms computed for local artifacts.
    pub algorithms: Vec<DigestAlgorithm>,
    /// Open local archives to extract `Requires-Python` and metadata digests.
    pub extract_metadata: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            algorithms: vec![DigestAlgorithm::Sha256],
            extract_metadata: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RefreshOptions {
    pub build: BuildOptions,
    /// Periodic full rescan; `None` disables polling.
    pub interval: Option<Duration>,
    /// How long a watched source must stay quiet after a change burst before
    /// the rebuild starts.
    pub quiet_period: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            build: BuildOptions::default(),
            interval: None,
            quiet_period: Duration::from_secs(10),
        }
    }
}

/// A change notification for a watched source. Carries no detail: any event
/// means "storage changed" and the whole source is rebuilt.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChangeEvent;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no source mounted at {mount:?}")]
    UnknownSource { mount: String },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

struct SourceSlot {
    id: usize,
    mount: String,
    source: Arc<dyn ScanSource>,
    /// Held for the duration of one build; makes builds single-flight.
    build_lock: tokio::sync::Mutex<()>,
    /// Set by every refresh request, cleared by the build that serves it.
    pending: AtomicBool,
}

pub struct RefreshEngine {
    registry: Arc<Registry>,
    digests: Arc<DigestCache>,
    options: RefreshOptions,
    slots: Vec<Arc<SourceSlot>>,
}

impl RefreshEngine {
    pub fn new(registry: Arc<Registry>, options: RefreshOptions) -> Self {
        Self {
            registry,
            digests: Arc::new(DigestCache::new()),
            options,
            slots: Vec::new(),
        }
    }

    /// Mount a source. `mount` prefixes every index the source produces;
    /// the empty string mounts it at the root.
    pub fn add_source(&mut self, mount: impl Into<String>, source: impl ScanSource + 'static) {
        self.slots.push(Arc::new(SourceSlot {
            id: self.slots.len(),
            mount: mount.into(),
            source: Arc::new(source),
            build_lock: tokio::sync::Mutex::new(()),
            pending: AtomicBool::new(false),
        }));
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn mounts(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.mount.clone()).collect()
    }

    /// Refresh every source once. Used at startup to produce the initial
    /// snapshots before serving begins.
    pub async fn refresh_all(&self) -> Result<(), RefreshError> {
        for slot in &self.slots {
            self.refresh_slot(slot).await?;
        }
        Ok(())
    }

    /// Refresh the source mounted at `mount`.
    pub async fn refresh(&self, mount: &str) -> Result<(), RefreshError> {
        let slot = self.slot(mount)?;
        self.refresh_slot(&Arc::clone(slot)).await
    }

    async fn refresh_slot(&self, slot: &Arc<SourceSlot>) -> Result<(), RefreshError> {
        slot.pending.store(true, Ordering::SeqCst);
        let _guard = slot.build_lock.lock().await;
        // A build that started after this request already ran while we were
        // queued on the lock; its result satisfies us.
        if !slot.pending.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let started = Instant::now();
        let source = Arc::clone(&slot.source);
        let digests = Arc::clone(&self.digests);
        let build_options = self.options.build.clone();
        let mount = slot.mount.clone();
        let result = tokio::task::spawn_blocking(move || {
            IndexBuilder::new(&digests, &build_options).build_source(&mount, source.as_ref())
        })
        .await?;

        match result {
            Ok(snapshots) => {
                tracing::info!(
                    target = "pier.index",
                    source = %slot.source.describe(),
                    mount = %slot.mount,
                    indexes = snapshots.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "source refreshed"
                );
                self.registry.publish(slot.id, snapshots);
                self.digests.evict_missing();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    target = "pier.index",
                    source = %slot.source.describe(),
                    mount = %slot.mount,
                    error = %err,
                    "scan failed; keeping previous snapshots"
                );
                Err(err.into())
            }
        }
    }

    /// Spawn the periodic rescan tasks, one per source. No-op when polling
    /// is disabled.
    pub fn spawn_poll(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let Some(interval) = self.options.interval else {
            return Vec::new();
        };
        self.slots
            .iter()
            .map(|slot| {
                let engine = Arc::clone(self);
                let slot = Arc::clone(slot);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    // The first tick completes immediately; startup already
                    // refreshed.
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if let Err(err) = engine.refresh_slot(&slot).await {
                            tracing::warn!(
                                target = "pier.index",
                                mount = %slot.mount,
                                error = %err,
                                "periodic refresh failed"
                            );
                        }
                    }
                })
            })
            .collect()
    }

    /// Drive refreshes of one source from a change stream. Bursts are
    /// absorbed: the rebuild starts once the stream has been quiet for the
    /// configured period. The task ends when the sender is dropped.
    pub fn attach_changes(
        self: &Arc<Self>,
        mount: &str,
        mut changes: UnboundedReceiver<ChangeEvent>,
    ) -> Result<JoinHandle<()>, RefreshError> {
        let slot = Arc::clone(self.slot(mount)?);
        let engine = Arc::clone(self);
        let quiet = self.options.quiet_period;
        Ok(tokio::spawn(async move {
            while changes.recv().await.is_some() {
                loop {
                    match tokio::time::timeout(quiet, changes.recv()).await {
                        Ok(Some(_)) => continue,
                        Ok(None) | Err(_) => break,
                    }
                }
                tracing::debug!(
                    target = "pier.index",
                    mount = %slot.mount,
                    "change burst settled"
                );
                if let Err(err) = engine.refresh_slot(&slot).await {
                    tracing::warn!(
                        target = "pier.index",
                        mount = %slot.mount,
                        error = %err,
                        "change-triggered refresh failed"
                    );
                }
            }
        }))
    }

    fn slot(&self, mount: &str) -> Result<&Arc<SourceSlot>, RefreshError> {
        self.slots
            .iter()
            .find(|slot| slot.mount == mount)
            .ok_or_else(|| RefreshError::UnknownSource {
                mount: mount.to_string(),
            })
    }
}
