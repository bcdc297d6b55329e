//! Detail view sync loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use consulta_core::{Consultation, ConsultationGateway};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;

/// Cached consultation of a detail view, `None` while nothing is open.
pub type DetailCache = watch::Receiver<Option<Consultation>>;

struct RunningLoop {
    id: String,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RunningLoop {
    fn shutdown(self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Keeps one consultation's cached record eventually consistent with the
/// gateway while its detail view is open.
///
/// The cadence follows the cached status and is recomputed before every
/// tick. 401/403/404 stop the loop for good; other errors wait for the next
/// tick. Dropping the sync aborts its loop.
pub struct DetailSync<G: ConsultationGateway + ?Sized + 'static> {
    gateway: Arc<G>,
    config: SyncConfig,
    cache: Arc<watch::Sender<Option<Consultation>>>,
    running: Option<RunningLoop>,
}

impl<G: ConsultationGateway + ?Sized + 'static> DetailSync<G> {
    pub fn new(gateway: Arc<G>, config: SyncConfig) -> Self {
        let (cache, _) = watch::channel(None);
        Self {
            gateway,
            config,
            cache: Arc::new(cache),
            running: None,
        }
    }

    /// Subscribe to the cached record.
    pub fn subscribe(&self) -> DetailCache {
        self.cache.subscribe()
    }

    pub fn current(&self) -> Option<Consultation> {
        self.cache.borrow().clone()
    }

    /// Id of the open consultation, if any.
    pub fn open_id(&self) -> Option<&str> {
        self.running.as_ref().map(|running| running.id.as_str())
    }

    /// Whether the loop is still polling.
    pub fn is_polling(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.stopped.load(Ordering::SeqCst))
    }

    /// Open a consultation: load it once, then poll it in the background.
    ///
    /// Any loop for a previous id is aborted first. When the first load hits
    /// a permanent error no loop is started.
    pub async fn open(&mut self, id: &str) -> Result<Consultation, SyncError> {
        self.close();

        let consultation = self.gateway.get_consultation(id).await?;
        self.cache.send_replace(Some(consultation.clone()));

        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_detail_loop(
            self.gateway.clone(),
            self.config.clone(),
            id.to_string(),
            self.cache.clone(),
            stopped.clone(),
        ));

        info!(consultation_id = %id, screen = %consultation.screen(), "Detail sync started");
        self.running = Some(RunningLoop {
            id: id.to_string(),
            stopped,
            task,
        });
        Ok(consultation)
    }

    /// Stop polling and clear the cache.
    pub fn close(&mut self) {
        if let Some(running) = self.running.take() {
            debug!(consultation_id = %running.id, "Detail sync closed");
            running.shutdown();
        }
        self.cache.send_replace(None);
    }

    /// Store a record obtained outside the loop, e.g. after a stage change.
    ///
    /// Ignored when it belongs to another consultation than the open one.
    pub fn store(&self, consultation: Consultation) {
        if self.open_id() == Some(consultation.id.as_str()) {
            self.cache.send_replace(Some(consultation));
        }
    }
}

impl<G: ConsultationGateway + ?Sized + 'static> Drop for DetailSync<G> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown();
        }
    }
}

async fn run_detail_loop<G: ConsultationGateway + ?Sized>(
    gateway: Arc<G>,
    config: SyncConfig,
    id: String,
    cache: Arc<watch::Sender<Option<Consultation>>>,
    stopped: Arc<AtomicBool>,
) {
    loop {
        let status = cache.borrow().as_ref().map(|c| c.status);
        sleep(config.detail_interval(status)).await;

        if stopped.load(Ordering::SeqCst) {
            debug!(consultation_id = %id, "Detail sync inactive, exiting");
            return;
        }

        match gateway.get_consultation(&id).await {
            Ok(fresh) => {
                if stopped.load(Ordering::SeqCst) {
                    return;
                }
                let fresh_status = fresh.status;
                let changed = cache.send_if_modified(|cached| match cached {
                    Some(current) if !current.differs_for_sync(&fresh) => false,
                    _ => {
                        *cached = Some(fresh);
                        true
                    }
                });
                if changed {
                    info!(consultation_id = %id, status = ?fresh_status, "Consultation changed on server");
                } else {
                    debug!(consultation_id = %id, "No change");
                }
            }
            Err(e) if e.stops_polling() => {
                warn!(consultation_id = %id, error = %e, "Stopping detail sync permanently");
                stopped.store(true, Ordering::SeqCst);
                return;
            }
            Err(e) => {
                warn!(consultation_id = %id, error = %e, "Detail sync tick failed, retrying next tick");
            }
        }
    }
}
