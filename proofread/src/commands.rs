use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use crate::config::{self, Settings};
use crate::heuristics::{self, HeuristicConfig, HeuristicCorrector, HeuristicReport};
use crate::metrics::MetricsReport;
use crate::monitor::{MonitorController, PipelineEvent, StartStatus};
use crate::network::{Corrector, CorrectorClient};
use crate::notify::{DesktopNotifier, LogNotifier, Notifier};
use crate::permissions::check_permissions;
use crate::source::live::DEFAULT_EDIT_CHANNEL_CAPACITY;
use crate::source::{ClipboardSource, LiveInputHandle, SourceKind, live_input};
use crate::store::{FileKeyValueStore, KeyValueStore, ReportEntry, ReportStore, read_monitor_flag};
use crate::utils::preview;

#[derive(Debug, Parser)]
#[command(
    name = "proofread",
    version,
    about = "Watches copied or typed text and suggests grammar and spelling fixes"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the clipboard and suggest corrections for copied text until Ctrl-C
    Watch {
        /// Use the local heuristic checker instead of the correction service
        #[arg(long)]
        offline: bool,
        /// Do not show desktop notifications
        #[arg(long)]
        no_notify: bool,
    },
    /// Check a document typed on stdin; every line is one edit
    Live {
        #[arg(long)]
        offline: bool,
    },
    /// Run the local checks on a file, or stdin when no file is given
    Check {
        file: Option<PathBuf>,
        /// Print the text with automatic fixes applied
        #[arg(long)]
        fix: bool,
    },
    /// Analyze one text with the correction service and store the report
    Analyze {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        offline: bool,
    },
    /// List stored reports, newest first
    Reports {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show the persisted monitor flag and report count
    Status,
    /// Check notification and clipboard access
    Permissions,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    Show,
    /// Store the correction service token in the OS keyring
    SetApiKey { key: String },
    /// Set one setting by its JSON name, e.g. `debounceMs 1500`
    Set { key: String, value: String },
}

pub async fn execute(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Watch { offline, no_notify } => watch_clipboard(offline, no_notify).await,
        Command::Live { offline } => live_check(offline).await,
        Command::Check { file, fix } => check_file(file, fix).await,
        Command::Analyze {
            text,
            file,
            offline,
        } => analyze_once(text, file, offline).await,
        Command::Reports { limit, json } => list_reports(limit, json),
        Command::Status => print_status(),
        Command::Permissions => print_json(&check_permissions(&DesktopNotifier)),
        Command::Config { action } => configure(action),
    }
}

struct Workspace {
    settings: Settings,
    backend: Arc<dyn KeyValueStore>,
    store: Arc<Mutex<ReportStore>>,
}

impl Workspace {
    fn open() -> anyhow::Result<Self> {
        let settings = config::load_settings().context("failed to load settings")?;
        let data_dir = settings.data_dir()?;
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(data_dir));
        let store = ReportStore::open(backend.clone(), settings.report_capacity);

        Ok(Self {
            settings,
            backend,
            store: Arc::new(Mutex::new(store)),
        })
    }

    fn corrector(&self, offline: bool) -> anyhow::Result<Arc<dyn Corrector>> {
        if offline {
            info!("using local heuristic checks");
            return Ok(Arc::new(HeuristicCorrector::new(HeuristicConfig::default())));
        }

        let client = CorrectorClient::new(self.settings.corrector_config())
            .context("failed to create correction client")?;
        info!(endpoint = client.endpoint(), "using correction service");
        Ok(Arc::new(client))
    }

    fn controller(
        &self,
        kind: SourceKind,
        corrector: Arc<dyn Corrector>,
        notifier: Arc<dyn Notifier>,
        notifications: bool,
    ) -> MonitorController {
        let mut monitor_config = self.settings.monitor_config(kind);
        monitor_config.notifications &= notifications;

        MonitorController::new(
            corrector,
            notifier,
            self.store.clone(),
            self.backend.clone(),
            monitor_config,
        )
    }
}

async fn watch_clipboard(offline: bool, no_notify: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open()?;
    let corrector = workspace.corrector(offline)?;
    let mut controller = workspace.controller(
        SourceKind::Clipboard,
        corrector,
        Arc::new(DesktopNotifier),
        !no_notify,
    );
    let mut events = controller.subscribe();

    let source = ClipboardSource::system(workspace.settings.poll_interval());
    ensure_started(controller.start(Box::new(source)).await?)?;
    eprintln!("Watching the clipboard. Press Ctrl-C to stop.");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event output fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    controller.stop().await?;
    print_metrics(&controller.metrics().await);
    Ok(())
}

async fn live_check(offline: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open()?;
    let corrector = workspace.corrector(offline)?;
    let mut controller =
        workspace.controller(SourceKind::LiveInput, corrector, Arc::new(LogNotifier), true);
    let mut events = controller.subscribe();

    let (handle, source) = live_input(DEFAULT_EDIT_CHANNEL_CAPACITY);
    ensure_started(controller.start(Box::new(source)).await?)?;
    let reader = tokio::spawn(forward_stdin(handle));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            finished = controller.wait() => {
                finished?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event output fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    controller.stop().await?;
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    reader.abort();
    print_metrics(&controller.metrics().await);
    Ok(())
}

/// Feeds stdin into the live source, sending the whole document after every
/// line. Dropping the handle at EOF lets the monitor drain and finish.
async fn forward_stdin(handle: LiveInputHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut document = String::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !document.is_empty() {
                    document.push('\n');
                }
                document.push_str(&line);
                if handle.edit(document.clone()).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!("failed to read stdin: {err}");
                break;
            }
        }
    }
}

fn ensure_started(status: StartStatus) -> anyhow::Result<()> {
    match status {
        StartStatus::Started => Ok(()),
        StartStatus::PermissionDenied => bail!(
            "notifications are not permitted; see `proofread permissions` or pass --no-notify"
        ),
        StartStatus::AlreadyRunning | StartStatus::Busy => {
            bail!("a monitor is already running in this process")
        }
    }
}

async fn check_file(file: Option<PathBuf>, fix: bool) -> anyhow::Result<()> {
    let text = read_input(file).await?;
    let report = heuristics::check_text(&text, &HeuristicConfig::default());

    if fix {
        print!("{}", heuristics::apply_fixes(&text, &report));
        return Ok(());
    }

    print_heuristic_report(&report);
    Ok(())
}

async fn analyze_once(
    text: Option<String>,
    file: Option<PathBuf>,
    offline: bool,
) -> anyhow::Result<()> {
    let text = match text {
        Some(text) => text,
        None => read_input(file).await?,
    };
    if text.trim().is_empty() {
        bail!("nothing to analyze");
    }

    let workspace = Workspace::open()?;
    let corrector = workspace.corrector(offline)?;
    let outcome = corrector.analyze(&text).await?;

    let entry = ReportEntry::new(text, outcome, SourceKind::Manual);
    if let Err(err) = workspace.store.lock().await.append(entry.clone()) {
        warn!("failed to store report: {err}");
    }
    print_json(&entry)
}

fn list_reports(limit: usize, json: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open()?;
    let store = workspace.store.try_lock().context("report store is busy")?;
    let entries = store.list().iter().take(limit).collect::<Vec<_>>();

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No reports yet.");
    }
    for entry in entries {
        println!(
            "{}  {:<10}  {:>2} issue(s)  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            source_label(entry.source),
            entry.analysis.error_count,
            preview(&entry.original_text)
        );
    }
    Ok(())
}

fn print_status() -> anyhow::Result<()> {
    let workspace = Workspace::open()?;
    let monitoring = read_monitor_flag(workspace.backend.as_ref()).unwrap_or_else(|err| {
        warn!("failed to read monitor flag: {err}");
        false
    });
    let report_count = workspace
        .store
        .try_lock()
        .map(|store| store.len())
        .unwrap_or(0);

    print_json(&serde_json::json!({
        "monitoring": monitoring,
        "reportCount": report_count,
        "dataDir": workspace.settings.data_dir()?,
        "settings": workspace.settings.redacted(),
    }))
}

fn configure(action: ConfigAction) -> anyhow::Result<()> {
    // Edits start from what is persisted so environment overrides stay one-off.
    let stored = || config::load_stored_settings().context("failed to load settings");

    let updated = match action {
        ConfigAction::Show => {
            let settings = config::load_settings().context("failed to load settings")?;
            return print_json(&settings.redacted());
        }
        ConfigAction::SetApiKey { key } => Settings {
            api_key: key,
            ..stored()?
        },
        ConfigAction::Set { key, value } => config::set_field(&stored()?, &key, &value)?,
    };

    let saved = config::save_settings(updated)?;
    print_json(&saved.redacted())
}

async fn read_input(file: Option<PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn source_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Clipboard => "clipboard",
        SourceKind::LiveInput => "live",
        SourceKind::Manual => "manual",
    }
}

fn print_heuristic_report(report: &HeuristicReport) {
    println!(
        "{} words, {} characters",
        report.word_count, report.char_count
    );
    for (label, findings) in [("error", &report.errors), ("suggestion", &report.suggestions)] {
        for finding in findings {
            match finding.line {
                Some(line) => println!("{label} (line {line}): {}", finding.message),
                None => println!("{label}: {}", finding.message),
            }
        }
    }
    if report.is_clean() {
        println!("No issues found.");
    }
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::SnapshotAccepted { .. } => {}
        PipelineEvent::LocalCheck(report) => {
            if !report.errors.is_empty() {
                print_heuristic_report(report);
            }
        }
        PipelineEvent::AnalysisCompleted(entry) => {
            let analysis = &entry.analysis;
            if analysis.has_errors {
                println!(
                    "Found {} issue(s) in \"{}\"",
                    analysis.error_count,
                    preview(&entry.original_text)
                );
                for correction in &analysis.corrections {
                    println!("  {} → {}", correction.original, correction.corrected);
                }
            } else {
                println!("No issues in \"{}\"", preview(&entry.original_text));
            }
        }
        PipelineEvent::AnalysisFailed { error, .. } => {
            eprintln!("Analysis failed: {error}");
        }
        PipelineEvent::Notified(_) => {}
    }
}

fn print_metrics(report: &MetricsReport) {
    eprintln!(
        "{} analyses ({} degraded, {} failed), p95 latency {}ms",
        report.analyses_completed,
        report.analyses_degraded,
        report.analyses_failed,
        report.analysis_latency.p95_ms
    );
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_watch_flags() {
        let cli = Cli::try_parse_from(["proofread", "-vv", "watch", "--offline", "--no-notify"])
            .expect("valid arguments");

        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Watch {
                offline: true,
                no_notify: true
            }
        ));
    }

    #[test]
    fn analyze_rejects_text_and_file_together() {
        let result =
            Cli::try_parse_from(["proofread", "analyze", "some text", "--file", "essay.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_set_takes_key_and_value() {
        let cli = Cli::try_parse_from(["proofread", "config", "set", "debounceMs", "1500"])
            .expect("valid arguments");
        let Command::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        else {
            panic!("expected config set");
        };
        assert_eq!(key, "debounceMs");
        assert_eq!(value, "1500");
    }
}
