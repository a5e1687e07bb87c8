use crate::db::Store;
use crate::downloader::transfer::{self, TransferError};
use crate::models::{DownloadRecord, DownloadStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Notification emitted on every observable state change of a download.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Queued {
        source_id: String,
    },
    Started {
        source_id: String,
    },
    Progress {
        source_id: String,
        progress: f64,
        downloaded_bytes: i64,
        total_bytes: Option<i64>,
    },
    Completed {
        source_id: String,
    },
    Failed {
        source_id: String,
        error: String,
    },
    Paused {
        source_id: String,
    },
    Resumed {
        source_id: String,
    },
    Cancelled {
        source_id: String,
    },
}

/// Control messages accepted by the engine's command listener.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    PauseResume { source_id: String },
    Cancel { source_id: String },
}

#[derive(Default)]
struct EngineState {
    records: HashMap<String, DownloadRecord>,
    pending: VecDeque<String>,
    active: HashMap<String, JoinHandle<()>>,
}

struct Inner {
    store: Store,
    max_concurrent: usize,
    state: Mutex<EngineState>,
    snapshot_tx: watch::Sender<HashMap<String, DownloadRecord>>,
    events: broadcast::Sender<DownloadEvent>,
}

/// Bounded-concurrency transfer queue. Cheap to clone, all clones share
/// the same queue and state.
#[derive(Clone)]
pub struct DownloadEngine {
    inner: Arc<Inner>,
}

impl DownloadEngine {
    #[must_use]
    pub fn new(store: Store, max_concurrent: usize, event_bus_buffer_size: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(HashMap::new());
        let (events, _) = broadcast::channel(event_bus_buffer_size.max(1));

        Self {
            inner: Arc::new(Inner {
                store,
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(EngineState::default()),
                snapshot_tx,
                events,
            }),
        }
    }

    /// Current view of every tracked download, keyed by source id.
    pub async fn snapshot(&self) -> HashMap<String, DownloadRecord> {
        self.inner.state.lock().await.records.clone()
    }

    /// Watch channel that replays the latest snapshot to new subscribers.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HashMap<String, DownloadRecord>> {
        self.inner.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<DownloadEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: DownloadEvent) {
        // Send only fails when nobody is listening, which is fine.
        let _ = self.inner.events.send(event);
    }

    fn publish_snapshot(&self, state: &EngineState) {
        let _ = self.inner.snapshot_tx.send(state.records.clone());
    }

    async fn persist(&self, record: &DownloadRecord) {
        if let Err(e) = self.inner.store.upsert_download(record).await {
            warn!(
                source_id = %record.source_id,
                error = %e,
                "Failed to persist download record, continuing in memory"
            );
        }
    }

    /// Admits a new download. A record with the same source id makes this a
    /// no-op regardless of its status; records only leave via cancel.
    pub async fn enqueue(&self, mut record: DownloadRecord) -> bool {
        let mut state = self.inner.state.lock().await;

        if state.records.contains_key(&record.source_id) {
            debug!(source_id = %record.source_id, "Duplicate enqueue ignored");
            return false;
        }

        record.status = DownloadStatus::Queued;
        record.progress = 0.0;
        record.downloaded_bytes = None;

        let source_id = record.source_id.clone();
        info!(source_id = %source_id, title = %record.title, "Download queued");

        self.persist(&record).await;
        state.records.insert(source_id.clone(), record);
        state.pending.push_back(source_id.clone());

        self.publish_snapshot(&state);
        self.emit(DownloadEvent::Queued { source_id });
        self.schedule(&mut state);

        true
    }

    /// The only place that grants a transfer slot. Pops queued ids in
    /// admission order until the concurrency bound is reached.
    fn schedule(&self, state: &mut EngineState) {
        while state.active.len() < self.inner.max_concurrent {
            let Some(source_id) = state.pending.pop_front() else {
                break;
            };

            // Ids can go stale in the queue after a pause or cancel.
            let Some(record) = state.records.get_mut(&source_id) else {
                continue;
            };
            if record.status != DownloadStatus::Queued {
                continue;
            }

            record.status = DownloadStatus::Downloading;
            let record = record.clone();

            info!(source_id = %source_id, title = %record.title, "Transfer started");
            self.emit(DownloadEvent::Started {
                source_id: source_id.clone(),
            });

            let engine = self.clone();
            let handle = tokio::spawn(async move {
                let result = transfer::run_transfer(&engine, &record).await;
                engine.finish_transfer(&record.source_id, result).await;
            });

            state.active.insert(source_id, handle);
        }

        self.publish_snapshot(state);
    }

    async fn finish_transfer(&self, source_id: &str, result: Result<i64, TransferError>) {
        let mut state = self.inner.state.lock().await;

        // A pause or cancel already claimed this transfer; its outcome no
        // longer counts.
        if state.active.remove(source_id).is_none() {
            return;
        }

        if let Some(record) = state.records.get_mut(source_id) {
            match result {
                Ok(bytes) => {
                    record.status = DownloadStatus::Completed;
                    record.progress = 1.0;
                    record.downloaded_bytes = Some(bytes);
                    if record.total_bytes.is_none() {
                        record.total_bytes = Some(bytes);
                    }
                    info!(source_id = %source_id, bytes, "Download completed");
                    let record = record.clone();
                    self.persist(&record).await;
                    self.emit(DownloadEvent::Completed {
                        source_id: source_id.to_string(),
                    });
                }
                Err(e) => {
                    record.status = DownloadStatus::Failed;
                    warn!(source_id = %source_id, error = %e, "Download failed");
                    let record = record.clone();
                    self.persist(&record).await;
                    self.emit(DownloadEvent::Failed {
                        source_id: source_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.schedule(&mut state);
    }

    /// Progress callback from a running transfer. Ignored once the record
    /// left the DOWNLOADING state.
    pub(crate) async fn update_progress(
        &self,
        source_id: &str,
        downloaded_bytes: i64,
        total_bytes: Option<i64>,
        progress: f64,
    ) {
        let mut state = self.inner.state.lock().await;

        let Some(record) = state.records.get_mut(source_id) else {
            return;
        };
        if record.status != DownloadStatus::Downloading {
            return;
        }

        record.progress = progress;
        record.downloaded_bytes = Some(downloaded_bytes);
        record.total_bytes = total_bytes;

        let record = record.clone();
        if let Err(e) = self
            .inner
            .store
            .update_download_transition(
                &record.source_id,
                &record.media_id,
                record.status,
                progress,
                Some(downloaded_bytes),
                total_bytes,
            )
            .await
        {
            warn!(source_id = %source_id, error = %e, "Failed to persist progress");
        }

        self.publish_snapshot(&state);
        self.emit(DownloadEvent::Progress {
            source_id: source_id.to_string(),
            progress,
            downloaded_bytes,
            total_bytes,
        });
    }

    /// Commands address a download by its source id, or by the owning
    /// media item id when no exact match exists.
    fn resolve_key(state: &EngineState, key: &str) -> Option<String> {
        if state.records.contains_key(key) {
            return Some(key.to_string());
        }
        state
            .records
            .values()
            .find(|r| r.media_id == key)
            .map(|r| r.source_id.clone())
    }

    /// Toggles between running/queued and paused, and re-queues a failed
    /// download. Pausing discards any partial data but keeps the
    /// last-observed progress for display; the next transfer restarts from
    /// byte zero.
    pub async fn pause_resume(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock().await;

        let Some(source_id) = Self::resolve_key(&state, key) else {
            debug!(key = %key, "Pause/resume for unknown id ignored");
            return false;
        };
        let Some(status) = state.records.get(&source_id).map(|r| r.status) else {
            return false;
        };

        match status {
            DownloadStatus::Downloading => {
                if let Some(handle) = state.active.remove(&source_id) {
                    handle.abort();
                }
                let Some(record) = state.records.get_mut(&source_id) else {
                    return false;
                };
                record.status = DownloadStatus::Paused;

                let tmp = transfer::temp_path(&record.file_path);
                let record = record.clone();
                tokio::fs::remove_file(&tmp).await.ok();

                info!(source_id = %source_id, "Download paused");
                self.persist(&record).await;
                self.emit(DownloadEvent::Paused {
                    source_id: source_id.clone(),
                });
                self.schedule(&mut state);
                true
            }
            DownloadStatus::Queued => {
                let Some(record) = state.records.get_mut(&source_id) else {
                    return false;
                };
                record.status = DownloadStatus::Paused;
                let record = record.clone();
                state.pending.retain(|id| *id != source_id);

                info!(source_id = %source_id, "Queued download paused");
                self.persist(&record).await;
                self.emit(DownloadEvent::Paused {
                    source_id: source_id.clone(),
                });
                self.publish_snapshot(&state);
                true
            }
            DownloadStatus::Paused | DownloadStatus::Failed => {
                let Some(record) = state.records.get_mut(&source_id) else {
                    return false;
                };
                record.status = DownloadStatus::Queued;
                let record = record.clone();
                state.pending.push_back(source_id.clone());

                info!(source_id = %source_id, "Download re-queued, transfer will restart from the beginning");
                self.persist(&record).await;
                self.emit(DownloadEvent::Resumed {
                    source_id: source_id.clone(),
                });
                self.schedule(&mut state);
                true
            }
            DownloadStatus::Completed => {
                debug!(source_id = %source_id, "Pause/resume on completed record ignored");
                false
            }
        }
    }

    /// Removes a download entirely: running transfer, queue entry,
    /// in-memory record, durable row and any files on disk.
    pub async fn cancel(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock().await;

        let Some(source_id) = Self::resolve_key(&state, key) else {
            debug!(key = %key, "Cancel for unknown id ignored");
            return false;
        };
        let source_id = source_id.as_str();
        let Some(record) = state.records.remove(source_id) else {
            return false;
        };

        if let Some(handle) = state.active.remove(source_id) {
            handle.abort();
        }
        state.pending.retain(|id| id != source_id);

        if let Some(dir) = record.file_path.parent() {
            tokio::fs::remove_dir_all(dir).await.ok();
        }

        if let Err(e) = self.inner.store.delete_download(source_id).await {
            warn!(source_id = %source_id, error = %e, "Failed to delete download record");
        }

        info!(source_id = %source_id, title = %record.title, "Download cancelled");
        self.emit(DownloadEvent::Cancelled {
            source_id: source_id.to_string(),
        });
        self.schedule(&mut state);

        true
    }

    /// Rebuilds in-memory state from the durable store at boot. Transfers
    /// that were mid-flight when the process died come back as FAILED,
    /// queued ones re-enter the queue in their stored order.
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let rows = self.inner.store.list_downloads().await?;
        let mut state = self.inner.state.lock().await;
        let mut restored = 0;

        for mut record in rows {
            match record.status {
                DownloadStatus::Downloading => {
                    record.status = DownloadStatus::Failed;
                    self.persist(&record).await;
                }
                DownloadStatus::Queued => {
                    state.pending.push_back(record.source_id.clone());
                }
                DownloadStatus::Paused | DownloadStatus::Completed | DownloadStatus::Failed => {}
            }
            state.records.insert(record.source_id.clone(), record);
            restored += 1;
        }

        info!(
            restored,
            queued = state.pending.len(),
            "Download state restored"
        );
        self.schedule(&mut state);

        Ok(restored)
    }

    /// Spawns the command listener and returns its sender. Dropping every
    /// sender stops the listener.
    #[must_use]
    pub fn spawn_command_listener(&self) -> mpsc::Sender<EngineCommand> {
        let (tx, mut rx) = mpsc::channel::<EngineCommand>(32);
        let engine = self.clone();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    EngineCommand::PauseResume { source_id } => {
                        engine.pause_resume(&source_id).await;
                    }
                    EngineCommand::Cancel { source_id } => {
                        engine.cancel(&source_id).await;
                    }
                }
            }
            debug!("Engine command listener stopped");
        });

        tx
    }
}
