use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::heuristics::{HeuristicReport, check_text};
use crate::metrics::PipelineMetrics;
use crate::network::Corrector;
use crate::notify::{Notification, Notifier};
use crate::pipeline::{Debouncer, DedupGate, Rejection};
use crate::source::{ChangeSource, SourceKind};
use crate::state::TextSnapshot;
use crate::store::{ReportEntry, ReportStore};
use crate::utils::{char_len, preview};

use super::MonitorConfig;

/// What the pipeline did, for in-process observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PipelineEvent {
    #[serde(rename_all = "camelCase")]
    SnapshotAccepted { preview: String, char_count: usize },
    LocalCheck(HeuristicReport),
    AnalysisCompleted(ReportEntry),
    #[serde(rename_all = "camelCase")]
    AnalysisFailed { preview: String, error: String },
    Notified(Notification),
}

/// Everything the worker task shares with its controller. Borrowed across
/// awaits, so every field must be `Sync`.
pub(crate) struct WorkerContext {
    pub corrector: Arc<dyn Corrector>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub store: Arc<Mutex<ReportStore>>,
    pub metrics: Arc<Mutex<PipelineMetrics>>,
    pub events: broadcast::Sender<PipelineEvent>,
    pub config: MonitorConfig,
}

/// Runs one monitor until `cancel_token` fires or the source is exhausted.
///
/// Text flows source → dedup gate → debouncer → corrector → store →
/// notifier. The corrector is awaited inline, so at most one analysis is in
/// flight, and a result that lands after cancellation is dropped.
pub(crate) async fn monitor_loop(
    mut source: Box<dyn ChangeSource>,
    ctx: WorkerContext,
    cancel_token: CancellationToken,
) {
    let kind = source.kind();
    let mut gate = DedupGate::new(ctx.config.bounds);
    let mut debouncer = Debouncer::new(ctx.config.debounce);

    if kind == SourceKind::Clipboard {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return,
            initial = source.read() => match initial {
                Ok(text) => {
                    trace!(chars = char_len(&text), "seeded last snapshot from clipboard");
                    gate.seed(text);
                }
                Err(err) => debug!("initial clipboard read failed: {err}"),
            },
        }
    }

    info!(
        source = ?kind,
        quiet_ms = debouncer.quiet_period().as_millis() as u64,
        "monitor loop started"
    );
    let mut source_open = true;

    loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                if let Some(discarded) = debouncer.cancel() {
                    debug!(text = %preview(discarded.text()), "dropped pending snapshot on stop");
                }
                break;
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(snapshot) = debouncer.fire(Instant::now()) {
                    if !analyze_snapshot(&ctx, kind, snapshot, &cancel_token).await {
                        break;
                    }
                }
            }
            change = source.next_change(), if source_open => match change {
                Ok(Some(text)) => {
                    admit_change(&ctx, &mut gate, &mut debouncer, text).await;
                }
                Ok(None) => {
                    debug!(source = ?kind, "change source exhausted");
                    source_open = false;
                }
                Err(err) => {
                    debug!("change source read failed; skipping: {err}");
                    ctx.metrics.lock().await.record_source_error();
                }
            },
        }

        if !source_open && !debouncer.is_pending() {
            break;
        }
    }

    info!(source = ?kind, "monitor loop stopped");
}

async fn admit_change(
    ctx: &WorkerContext,
    gate: &mut DedupGate,
    debouncer: &mut Debouncer,
    text: String,
) {
    if ctx.config.local_checks && !text.trim().is_empty() {
        let report = check_text(&text, &ctx.config.heuristics);
        let _ = ctx.events.send(PipelineEvent::LocalCheck(report));
    }

    match gate.admit(&text) {
        Ok(snapshot) => {
            debug!(chars = char_len(&text), text = %preview(&text), "snapshot accepted");
            let _ = ctx.events.send(PipelineEvent::SnapshotAccepted {
                preview: preview(&text),
                char_count: char_len(&text),
            });

            let superseded = debouncer.submit(snapshot, Instant::now());
            let mut metrics = ctx.metrics.lock().await;
            metrics.record_accepted();
            if superseded.is_some() {
                metrics.record_superseded();
            }
        }
        Err(Rejection::Duplicate) => {
            trace!("text unchanged since last snapshot");
        }
        Err(reason) => {
            trace!(%reason, "snapshot rejected");
            ctx.metrics.lock().await.record_rejected();
        }
    }
}

/// Returns `false` once the monitor has been stopped. Nothing is stored or
/// notified after that point.
async fn analyze_snapshot(
    ctx: &WorkerContext,
    kind: SourceKind,
    snapshot: TextSnapshot,
    cancel_token: &CancellationToken,
) -> bool {
    let started = Instant::now();
    let waited_ms = started.duration_since(snapshot.captured()).as_millis() as u64;
    debug!(waited_ms, text = %preview(snapshot.text()), "analyzing snapshot");

    let result = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => None,
        result = ctx.corrector.analyze(snapshot.text()) => Some(result),
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    let Some(result) = result.filter(|_| !cancel_token.is_cancelled()) else {
        info!(latency_ms, "monitor stopped during analysis; result discarded");
        ctx.metrics.lock().await.record_discarded();
        return false;
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(latency_ms, "analysis failed; snapshot dropped: {err}");
            ctx.metrics.lock().await.record_analysis_failure(latency_ms);
            let _ = ctx.events.send(PipelineEvent::AnalysisFailed {
                preview: preview(snapshot.text()),
                error: err.to_string(),
            });
            return true;
        }
    };

    let degraded = outcome.is_degraded();
    let entry = ReportEntry::new(snapshot.into_text(), outcome, kind);
    info!(
        report_id = %entry.id,
        latency_ms,
        degraded,
        errors = entry.analysis.error_count,
        "analysis completed"
    );
    ctx.metrics.lock().await.record_analysis(latency_ms, degraded);

    let stored = {
        let mut store = ctx.store.lock().await;
        if cancel_token.is_cancelled() {
            drop(store);
            info!(report_id = %entry.id, "monitor stopped before the report was stored");
            ctx.metrics.lock().await.record_discarded();
            return false;
        }
        store.append(entry.clone())
    };
    if let Err(err) = stored {
        warn!("failed to persist report {}: {err}", entry.id);
        ctx.metrics.lock().await.record_storage_failure();
    }

    let notification = Notification::for_report(&entry);
    let _ = ctx.events.send(PipelineEvent::AnalysisCompleted(entry));

    if let Some(notification) = notification {
        if cancel_token.is_cancelled() {
            info!(
                report_id = %notification.data.report_id,
                "monitor stopped; notification skipped"
            );
            return false;
        }
        if let Some(notifier) = &ctx.notifier {
            let delivered = deliver(notifier.clone(), notification.clone()).await;
            ctx.metrics.lock().await.record_notification(delivered);
        }
        let _ = ctx.events.send(PipelineEvent::Notified(notification));
    }

    true
}

async fn deliver(notifier: Arc<dyn Notifier>, notification: Notification) -> bool {
    let outcome = tokio::task::spawn_blocking(move || notifier.notify(&notification)).await;
    match outcome {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!("failed to show notification: {err}");
            false
        }
        Err(err) => {
            warn!("notification task failed: {err}");
            false
        }
    }
}
