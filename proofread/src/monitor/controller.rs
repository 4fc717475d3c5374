use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppError;
use crate::metrics::{MetricsReport, PipelineMetrics};
use crate::network::Corrector;
use crate::notify::Notifier;
use crate::permissions::PermissionState;
use crate::source::ChangeSource;
use crate::store::{KeyValueStore, ReportEntry, ReportStore, read_monitor_flag, write_monitor_flag};

use super::MonitorConfig;
use super::worker::{PipelineEvent, WorkerContext, monitor_loop};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    AlreadyRunning,
    PermissionDenied,
    /// Another monitor in this process holds the slot.
    Busy,
}

/// Allows one running monitor per slot. [`MonitorSlot::process`] is shared by
/// the whole process.
#[derive(Debug, Clone, Default)]
pub struct MonitorSlot {
    held: Arc<AtomicBool>,
}

static PROCESS_SLOT: Lazy<MonitorSlot> = Lazy::new(MonitorSlot::new);

impl MonitorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process() -> Self {
        PROCESS_SLOT.clone()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<SlotLease> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotLease {
                held: self.held.clone(),
            })
    }
}

#[derive(Debug)]
struct SlotLease {
    held: Arc<AtomicBool>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

struct RunningMonitor {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the on/off lifecycle of one monitor.
pub struct MonitorController {
    corrector: Arc<dyn Corrector>,
    notifier: Arc<dyn Notifier>,
    store: Arc<Mutex<ReportStore>>,
    flags: Arc<dyn KeyValueStore>,
    metrics: Arc<Mutex<PipelineMetrics>>,
    events: broadcast::Sender<PipelineEvent>,
    slot: MonitorSlot,
    config: MonitorConfig,
    running: Option<RunningMonitor>,
}

impl MonitorController {
    pub fn new(
        corrector: Arc<dyn Corrector>,
        notifier: Arc<dyn Notifier>,
        store: Arc<Mutex<ReportStore>>,
        flags: Arc<dyn KeyValueStore>,
        config: MonitorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            corrector,
            notifier,
            store,
            flags,
            metrics: Arc::new(Mutex::new(PipelineMetrics::new())),
            events,
            slot: MonitorSlot::process(),
            config,
            running: None,
        }
    }

    pub fn with_slot(mut self, slot: MonitorSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Starts watching `source`. The source is dropped unless the status is
    /// [`StartStatus::Started`].
    pub async fn start(&mut self, source: Box<dyn ChangeSource>) -> Result<StartStatus, AppError> {
        if self.is_running() {
            return Ok(StartStatus::AlreadyRunning);
        }
        // A worker that ended on its own still holds the slot until joined.
        self.reap().await?;

        if self.config.notifications {
            let notifier = self.notifier.clone();
            let permission = tokio::task::spawn_blocking(move || notifier.permission())
                .await
                .map_err(|err| AppError::Runtime(format!("permission check failed: {err}")))?;
            match permission {
                PermissionState::Denied => {
                    warn!("notification permission denied; monitor not started");
                    return Ok(StartStatus::PermissionDenied);
                }
                PermissionState::Unknown => {
                    warn!("notification permission unknown; starting anyway");
                }
                PermissionState::Granted => {}
            }
        }

        let Some(lease) = self.slot.try_acquire() else {
            warn!("another monitor is already running in this process");
            return Ok(StartStatus::Busy);
        };

        let kind = source.kind();
        let cancel_token = CancellationToken::new();
        let context = WorkerContext {
            corrector: self.corrector.clone(),
            notifier: self.config.notifications.then(|| self.notifier.clone()),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
            events: self.events.clone(),
            config: self.config,
        };
        let worker_token = cancel_token.clone();
        // The slot stays held until the worker has wound down, even if this
        // controller is dropped first.
        let handle = tokio::spawn(async move {
            monitor_loop(source, context, worker_token).await;
            drop(lease);
        });

        self.running = Some(RunningMonitor { handle, cancel_token });
        self.persist_flag(true);
        info!(source = ?kind, "monitor started");

        Ok(StartStatus::Started)
    }

    /// Cancels the loop and any pending debounce, then waits for the worker.
    /// Stopping a stopped monitor is a no-op.
    pub async fn stop(&mut self) -> Result<(), AppError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        running.cancel_token.cancel();
        let joined = running.handle.await;
        self.persist_flag(false);
        info!("monitor stopped");

        joined.map_err(|err| AppError::Runtime(format!("monitor task failed to join: {err}")))
    }

    /// Resolves once the worker ends on its own, e.g. when live input closes.
    /// Cancel-safe; pending forever while stopped.
    pub async fn wait(&mut self) -> Result<(), AppError> {
        let Some(running) = self.running.as_mut() else {
            return std::future::pending().await;
        };

        let joined = (&mut running.handle).await;
        self.running = None;
        self.persist_flag(false);
        info!("monitor finished");

        joined.map_err(|err| AppError::Runtime(format!("monitor task failed: {err}")))
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// The persisted monitoring flag, which survives restarts.
    pub fn is_monitoring(&self) -> Result<bool, AppError> {
        Ok(read_monitor_flag(self.flags.as_ref())?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub async fn reports(&self) -> Vec<ReportEntry> {
        self.store.lock().await.list().to_vec()
    }

    pub async fn metrics(&self) -> MetricsReport {
        self.metrics.lock().await.report()
    }

    async fn reap(&mut self) -> Result<(), AppError> {
        match self.running.take() {
            Some(running) => {
                let joined = running.handle.await;
                self.persist_flag(false);
                joined.map_err(|err| AppError::Runtime(format!("monitor task failed: {err}")))
            }
            None => Ok(()),
        }
    }

    fn persist_flag(&self, active: bool) {
        if let Err(err) = write_monitor_flag(self.flags.as_ref(), active) {
            warn!("failed to persist monitor flag: {err}");
        }
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel_token.cancel();
        }
    }
}
