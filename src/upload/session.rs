//! Upload session state machine
//!
//! The controller owns the workflow state and is only mutated from the UI
//! loop. Remote calls and timers run as spawned tasks and report back as
//! [`SessionEvent`]s tagged with the epoch they were started in; an event
//! whose epoch or expected state no longer matches is dropped.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::conflict::{self, CheckDecision, ConflictEntry};
use super::poll::PollTask;
use super::progress::{ProgressMonitor, ProgressView};
use super::selection::{FileEntry, SelectionRegistry, SelectionSummary};
use super::transfer::{TransferStrategy, UploadRequest};
use super::{
    ConflictReport, FileCandidate, ProgressSnapshot, TransferOutcome, UploadError, UploadService,
};
use crate::notify::{Level, Notifier};

const EVENT_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// Picking files; also where recoverable problems land
    Selection,
    /// Waiting for the server's conflict check
    Checking,
    /// Server reported another running upload
    ActiveConflict,
    /// User decides about clashing and rejected names
    Overwrite {
        existing: BTreeSet<String>,
        invalid: BTreeSet<String>,
    },
    Uploading,
    Completed {
        files: usize,
    },
    Error {
        message: String,
        stacktrace: String,
    },
    Canceled,
}

impl WorkflowState {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::Selection => "selection",
            WorkflowState::Checking => "checking",
            WorkflowState::ActiveConflict => "active-conflict",
            WorkflowState::Overwrite { .. } => "overwrite",
            WorkflowState::Uploading => "uploading",
            WorkflowState::Completed { .. } => "completed",
            WorkflowState::Error { .. } => "error",
            WorkflowState::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Completed { .. } | WorkflowState::Error { .. } | WorkflowState::Canceled
        )
    }
}

/// Completion of async work started by the controller
#[derive(Debug)]
pub enum SessionEvent {
    CheckFinished {
        epoch: u64,
        result: Result<ConflictReport, UploadError>,
    },
    Progress {
        epoch: u64,
        result: Result<ProgressSnapshot, UploadError>,
    },
    /// Files are being read from local disk before sending
    LocalLoading {
        epoch: u64,
        active: bool,
    },
    TransferFinished {
        epoch: u64,
        result: Result<TransferOutcome, UploadError>,
    },
    CloseTimerElapsed {
        epoch: u64,
    },
}

impl SessionEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            SessionEvent::CheckFinished { epoch, .. }
            | SessionEvent::Progress { epoch, .. }
            | SessionEvent::LocalLoading { epoch, .. }
            | SessionEvent::TransferFinished { epoch, .. }
            | SessionEvent::CloseTimerElapsed { epoch } => *epoch,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SessionEvent::CheckFinished { .. } => "check",
            SessionEvent::Progress { .. } => "progress",
            SessionEvent::LocalLoading { .. } => "loading",
            SessionEvent::TransferFinished { .. } => "transfer",
            SessionEvent::CloseTimerElapsed { .. } => "close-timer",
        }
    }
}

/// Enablement of one user control, with the reason when disabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub enabled: bool,
    pub reason: Option<&'static str>,
}

impl Control {
    fn enabled() -> Self {
        Self {
            enabled: true,
            reason: None,
        }
    }

    fn disabled(reason: &'static str) -> Self {
        Self {
            enabled: false,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub commit: Control,
    pub add_files: Control,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub target_folder: String,
    pub poll_interval: Duration,
    pub close_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            target_folder: "/".to_string(),
            poll_interval: Duration::from_millis(1000),
            close_delay: Duration::from_millis(3000),
        }
    }
}

pub struct SessionController {
    id: Uuid,
    state: WorkflowState,
    epoch: u64,
    selection: SelectionRegistry,
    settings: SessionSettings,

    service: Arc<dyn UploadService>,
    strategy: Arc<dyn TransferStrategy>,
    notifier: Arc<dyn Notifier>,

    monitor: Option<ProgressMonitor>,
    progress: Option<ProgressView>,
    poll: PollTask,
    transfer_cancel: Option<CancellationToken>,
    loading_local: bool,
    closed: bool,

    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl SessionController {
    pub fn new(
        selection: SelectionRegistry,
        service: Arc<dyn UploadService>,
        strategy: Arc<dyn TransferStrategy>,
        notifier: Arc<dyn Notifier>,
        settings: SessionSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let id = Uuid::new_v4();
        tracing::info!(
            "Upload session {} targeting {} via {} transport",
            id,
            settings.target_folder,
            strategy.name()
        );

        Self {
            id,
            state: WorkflowState::Selection,
            epoch: 0,
            selection,
            settings,
            service,
            strategy,
            notifier,
            monitor: None,
            progress: None,
            poll: PollTask::new(),
            transfer_cancel: None,
            loading_local: false,
            closed: false,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn selection(&self) -> &SelectionRegistry {
        &self.selection
    }

    pub fn summary(&self) -> SelectionSummary {
        self.selection.summary()
    }

    pub fn target_folder(&self) -> &str {
        &self.settings.target_folder
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn progress(&self) -> Option<&ProgressView> {
        self.progress.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_active()
    }

    pub fn is_loading_local(&self) -> bool {
        self.loading_local
    }

    /// The dialog has been torn down
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn controls(&self) -> Controls {
        if self.closed {
            return Controls {
                commit: Control::disabled("dialog closed"),
                add_files: Control::disabled("dialog closed"),
            };
        }

        let commit_if_selected = || {
            if self.selection.has_files_to_transfer() {
                Control::enabled()
            } else {
                Control::disabled("nothing selected")
            }
        };

        match &self.state {
            WorkflowState::Selection | WorkflowState::ActiveConflict => Controls {
                commit: commit_if_selected(),
                add_files: Control::enabled(),
            },
            WorkflowState::Checking => Controls {
                commit: Control::disabled("checking…"),
                add_files: Control::disabled("checking…"),
            },
            WorkflowState::Overwrite { .. } => Controls {
                commit: commit_if_selected(),
                add_files: Control::disabled("resolve conflicts first"),
            },
            WorkflowState::Uploading => Controls {
                commit: Control::disabled("upload running"),
                add_files: Control::disabled("upload running"),
            },
            WorkflowState::Completed { .. }
            | WorkflowState::Error { .. }
            | WorkflowState::Canceled => Controls {
                commit: Control::disabled("session finished"),
                add_files: Control::disabled("session finished"),
            },
        }
    }

    /// Files shown in the main list, in display order
    pub fn entries(&self) -> Vec<FileEntry<'_>> {
        self.selection.entries()
    }

    /// Rows of the overwrite list; empty outside [`WorkflowState::Overwrite`]
    pub fn conflict_entries(&self) -> Vec<ConflictEntry> {
        match &self.state {
            WorkflowState::Overwrite { existing, invalid } => {
                conflict::conflict_entries(existing, invalid, &self.selection)
            }
            _ => Vec::new(),
        }
    }

    pub fn add_files(&mut self, candidates: Vec<FileCandidate>) -> bool {
        if !self.controls().add_files.enabled {
            tracing::debug!("Ignoring {} file(s) added in {}", candidates.len(), self.state.label());
            return false;
        }

        let report = self.selection.add_files(candidates);
        if let Some(limit) = self.selection.size_limit() {
            for name in &report.too_large {
                self.notifier.notify(
                    Level::Warning,
                    &format!(
                        "{} is larger than the upload limit of {}",
                        name,
                        humansize::format_size(limit, humansize::BINARY)
                    ),
                );
            }
        }
        true
    }

    pub fn toggle_selection(&mut self, name: &str, included: bool) -> bool {
        let changed = match &self.state {
            WorkflowState::Selection => self.selection.toggle_selection(name, included),
            WorkflowState::Overwrite { existing, invalid } => {
                existing.contains(name)
                    && !invalid.contains(name)
                    && self.selection.toggle_selection(name, included)
            }
            _ => false,
        };
        if changed {
            let summary = self.selection.summary();
            tracing::debug!(
                "Selection now {} file(s), {} bytes",
                summary.file_count,
                summary.total_bytes
            );
        }
        changed
    }

    /// Commit from selection runs the conflict check; commit from the
    /// overwrite list trusts the user's choices and uploads right away.
    pub fn commit(&mut self) -> bool {
        if !self.controls().commit.enabled {
            return false;
        }
        match self.state {
            WorkflowState::Selection | WorkflowState::ActiveConflict => {
                self.begin_check();
                true
            }
            WorkflowState::Overwrite { .. } => self.begin_upload(),
            _ => false,
        }
    }

    /// User abort. Tears down locally first, then tells the server.
    pub fn cancel(&mut self) {
        if self.closed {
            return;
        }

        let was_uploading = self.state == WorkflowState::Uploading;
        self.stop_polling();
        if let Some(token) = self.transfer_cancel.take() {
            token.cancel();
        }
        self.next_epoch();
        if !self.state.is_terminal() {
            self.transition(WorkflowState::Canceled);
        }
        self.closed = true;

        if was_uploading {
            let service = self.service.clone();
            tokio::spawn(async move {
                if let Err(e) = service.cancel_upload().await {
                    tracing::debug!("Cancel notification failed: {}", e);
                }
            });
        }
    }

    /// Close the error or completion dialog
    pub fn acknowledge(&mut self) {
        if self.state.is_terminal() {
            self.closed = true;
        }
    }

    /// Stop the progress poll; safe to call repeatedly
    pub fn stop_polling(&mut self) {
        self.poll.stop();
        self.loading_local = false;
    }

    #[cfg(test)]
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Handle every event that is already queued
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        if event.epoch() != self.epoch {
            tracing::debug!(
                "Ignoring stale {} event (epoch {}, current {})",
                event.kind(),
                event.epoch(),
                self.epoch
            );
            return;
        }

        match event {
            SessionEvent::CheckFinished { result, .. } => self.on_check_finished(result),
            SessionEvent::Progress { result, .. } => self.on_progress(result),
            SessionEvent::LocalLoading { active, .. } => {
                if self.state == WorkflowState::Uploading {
                    self.loading_local = active;
                }
            }
            SessionEvent::TransferFinished { result, .. } => self.on_transfer_finished(result),
            SessionEvent::CloseTimerElapsed { .. } => {
                if matches!(self.state, WorkflowState::Completed { .. }) {
                    self.closed = true;
                }
            }
        }
    }

    fn begin_check(&mut self) {
        let epoch = self.next_epoch();
        let names = self.selection.ordered_names_to_transfer();
        self.transition(WorkflowState::Checking);

        let service = self.service.clone();
        let target_folder = self.settings.target_folder.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = conflict::check(service.as_ref(), &names, &target_folder).await;
            let _ = tx.send(SessionEvent::CheckFinished { epoch, result }).await;
        });
    }

    fn on_check_finished(&mut self, result: Result<ConflictReport, UploadError>) {
        if self.state != WorkflowState::Checking {
            return;
        }

        let report = match result {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!("Upload check failed: {}", err.trace());
                self.notifier
                    .notify(Level::Error, &format!("Could not check the files: {}", err));
                self.transition(WorkflowState::Selection);
                return;
            }
        };

        match conflict::decide(report) {
            CheckDecision::SessionBusy => {
                self.transition(WorkflowState::ActiveConflict);
                self.notifier.notify(
                    Level::Warning,
                    "Another upload is running. Try again once it has finished.",
                );
                self.transition(WorkflowState::Selection);
            }
            CheckDecision::ResolveConflicts { existing, invalid } => {
                self.selection.mark_invalid(&invalid);
                self.transition(WorkflowState::Overwrite { existing, invalid });
            }
            CheckDecision::Proceed => {
                self.begin_upload();
            }
        }
    }

    fn begin_upload(&mut self) -> bool {
        let files = self.selection.ordered_files_to_transfer();
        if files.is_empty() {
            self.notifier.notify(Level::Warning, "No files left to upload");
            self.transition(WorkflowState::Selection);
            return false;
        }

        let epoch = self.next_epoch();
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let monitor = ProgressMonitor::new(names, self.selection.summary().total_bytes);
        self.progress = Some(monitor.initial());
        self.monitor = Some(monitor);
        self.loading_local = false;
        self.transition(WorkflowState::Uploading);

        let cancel_token = CancellationToken::new();
        self.transfer_cancel = Some(cancel_token.clone());
        let strategy = self.strategy.clone();
        let request = UploadRequest {
            target_folder: self.settings.target_folder.clone(),
            files,
        };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let loading_tx = tx.clone();
            let on_loading = move |active: bool| {
                if let Err(e) = loading_tx.try_send(SessionEvent::LocalLoading { epoch, active }) {
                    tracing::debug!("Dropped loading indicator update: {}", e);
                }
            };
            let result = tokio::select! {
                _ = cancel_token.cancelled() => Err(UploadError::Canceled),
                result = strategy.upload(request, &on_loading) => result,
            };
            let _ = tx.send(SessionEvent::TransferFinished { epoch, result }).await;
        });

        self.start_polling(epoch);
        true
    }

    fn start_polling(&mut self, epoch: u64) {
        let service = self.service.clone();
        let tx = self.events_tx.clone();
        self.poll.start(self.settings.poll_interval, move || {
            let service = service.clone();
            let tx = tx.clone();
            async move {
                let result = service.get_upload_progress_info().await;
                tx.send(SessionEvent::Progress { epoch, result }).await.is_ok()
            }
        });
    }

    fn on_progress(&mut self, result: Result<ProgressSnapshot, UploadError>) {
        if self.state != WorkflowState::Uploading {
            return;
        }

        match result {
            Ok(snapshot) => {
                if let Some(monitor) = self.monitor.as_mut() {
                    self.progress = Some(monitor.apply(&snapshot));
                }
                if !snapshot.running {
                    tracing::debug!("Server reports the upload is no longer running");
                    self.stop_polling();
                }
            }
            Err(err) => tracing::warn!("Progress poll failed: {}", err),
        }
    }

    fn on_transfer_finished(&mut self, result: Result<TransferOutcome, UploadError>) {
        if self.state != WorkflowState::Uploading {
            return;
        }

        self.stop_polling();
        self.transfer_cancel = None;

        match result {
            Ok(outcome) if outcome.success => {
                let files = self
                    .monitor
                    .as_ref()
                    .map_or(0, |m| m.ordered_names().len());
                if let Some(monitor) = self.monitor.as_mut() {
                    self.progress = Some(monitor.finished(outcome.request_size));
                }
                self.transition(WorkflowState::Completed { files });
                self.notifier
                    .notify(Level::Info, &format!("{} file(s) uploaded", files));
                self.schedule_close();
            }
            Ok(outcome) => self.fail(outcome.message, outcome.stacktrace),
            Err(err) => {
                let trace = err.trace();
                self.fail(err.to_string(), trace);
            }
        }
    }

    fn fail(&mut self, message: String, stacktrace: String) {
        tracing::warn!("Upload failed: {}", message);
        self.transition(WorkflowState::Error {
            message,
            stacktrace,
        });
    }

    fn schedule_close(&self) {
        let epoch = self.epoch;
        let delay = self.settings.close_delay;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionEvent::CloseTimerElapsed { epoch }).await;
        });
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::debug!(
            session = %self.id,
            "{} -> {}",
            self.state.label(),
            next.label()
        );
        self.state = next;
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(token) = self.transfer_cancel.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::service::HttpUploadService;
    use crate::upload::testing::{CannedServer, CapturingNotifier, FakeService, FakeStrategy};
    use crate::upload::transfer::BinaryPostStrategy;

    struct Harness {
        controller: SessionController,
        service: Arc<FakeService>,
        strategy: Arc<FakeStrategy>,
        notifier: Arc<CapturingNotifier>,
    }

    fn harness(service: FakeService, strategy: FakeStrategy, files: &[(&str, u64)]) -> Harness {
        harness_with_limit(service, strategy, files, None)
    }

    fn harness_with_limit(
        service: FakeService,
        strategy: FakeStrategy,
        files: &[(&str, u64)],
        limit: Option<u64>,
    ) -> Harness {
        let service = Arc::new(service);
        let strategy = Arc::new(strategy);
        let notifier = Arc::new(CapturingNotifier::default());

        let mut selection = SelectionRegistry::new(limit);
        selection.add_files(
            files
                .iter()
                .map(|(name, size)| FileCandidate::from_bytes(*name, vec![0; *size as usize])),
        );

        let settings = SessionSettings {
            target_folder: "/sites/default/".to_string(),
            poll_interval: Duration::from_secs(3600),
            close_delay: Duration::from_millis(10),
        };
        let controller = SessionController::new(
            selection,
            service.clone(),
            strategy.clone(),
            notifier.clone(),
            settings,
        );

        Harness {
            controller,
            service,
            strategy,
            notifier,
        }
    }

    async fn step(controller: &mut SessionController) {
        let event = tokio::time::timeout(Duration::from_secs(5), controller.next_event())
            .await
            .expect("no session event arrived")
            .expect("event channel closed");
        controller.handle_event(event);
    }

    fn snapshot(current_file: u32, percent: u8, running: bool) -> ProgressSnapshot {
        ProgressSnapshot {
            current_file,
            percent,
            running,
            content_length: 0,
        }
    }

    async fn start_holding_upload(files: &[(&str, u64)]) -> Harness {
        let mut h = harness(FakeService::default(), FakeStrategy::holding(), files);
        assert!(h.controller.commit());
        step(&mut h.controller).await;
        assert_eq!(*h.controller.state(), WorkflowState::Uploading);
        h
    }

    fn body_position(body: &[u8], needle: &str) -> usize {
        body.windows(needle.len())
            .position(|w| w == needle.as_bytes())
            .unwrap_or_else(|| panic!("{} not in body", needle))
    }

    #[tokio::test]
    async fn test_http_check_then_binary_post_completes() {
        let mut server = CannedServer::start(vec![
            (
                200,
                r#"{"existingNames":[],"invalidNames":[],"sessionActive":false}"#.to_string(),
            ),
            (
                200,
                r#"{"success":true,"message":"","stacktrace":"","requestSize":42}"#.to_string(),
            ),
        ])
        .await;
        let service = HttpUploadService::new(&server.url, Duration::from_secs(5)).unwrap();
        let strategy = Arc::new(BinaryPostStrategy::new(
            service.client().clone(),
            service.upload_url(),
        ));
        let notifier = Arc::new(CapturingNotifier::default());

        let mut selection = SelectionRegistry::new(None);
        selection.add_files(vec![
            FileCandidate::from_bytes("b.txt", b"second".to_vec()),
            FileCandidate::from_bytes("A.txt", b"first".to_vec()),
        ]);
        let settings = SessionSettings {
            target_folder: "/sites/default/".to_string(),
            poll_interval: Duration::from_secs(3600),
            close_delay: Duration::from_secs(3600),
        };
        let mut controller = SessionController::new(
            selection,
            Arc::new(service),
            strategy,
            notifier.clone(),
            settings,
        );

        assert!(controller.commit());
        for _ in 0..8 {
            if controller.state().is_terminal() {
                break;
            }
            step(&mut controller).await;
        }
        assert_eq!(*controller.state(), WorkflowState::Completed { files: 2 });
        assert!(!controller.is_loading_local());
        assert_eq!(
            notifier.of_level(Level::Info),
            vec!["2 file(s) uploaded".to_string()]
        );

        let check = server.next_request().await;
        assert!(check.head.starts_with("POST /check"));
        let upload = server.next_request().await;
        assert!(upload.head.starts_with("POST /upload"));
        assert!(body_position(&upload.body, "/sites/default/") < body_position(&upload.body, "A.txt"));
        assert!(body_position(&upload.body, "A.txt") < body_position(&upload.body, "b.txt"));
        assert!(body_position(&upload.body, "first") < body_position(&upload.body, "second"));
    }

    #[tokio::test]
    async fn test_initial_selection_state() {
        let h = harness(
            FakeService::default(),
            FakeStrategy::succeeding(),
            &[("b.txt", 10), ("a.txt", 20)],
        );

        assert_eq!(*h.controller.state(), WorkflowState::Selection);
        assert_eq!(h.controller.summary().total_bytes, 30);
        let names: Vec<&str> = h
            .controller
            .entries()
            .iter()
            .map(|e| e.candidate.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let controls = h.controller.controls();
        assert!(controls.commit.enabled);
        assert!(controls.add_files.enabled);
    }

    #[tokio::test]
    async fn test_commit_disabled_without_files() {
        let mut h = harness(FakeService::default(), FakeStrategy::succeeding(), &[]);
        let controls = h.controller.controls();
        assert!(!controls.commit.enabled);
        assert_eq!(controls.commit.reason, Some("nothing selected"));
        assert!(!h.controller.commit());
        assert_eq!(*h.controller.state(), WorkflowState::Selection);
    }

    #[tokio::test]
    async fn test_clean_check_uploads_and_auto_closes() {
        let mut h = harness(
            FakeService::default(),
            FakeStrategy::succeeding(),
            &[("b.txt", 10), ("a.txt", 20)],
        );

        assert!(h.controller.commit());
        assert_eq!(*h.controller.state(), WorkflowState::Checking);
        assert_eq!(h.controller.controls().commit.reason, Some("checking…"));

        step(&mut h.controller).await;
        assert_eq!(*h.controller.state(), WorkflowState::Uploading);
        assert!(h.controller.is_polling());
        assert!(!h.controller.controls().add_files.enabled);

        step(&mut h.controller).await;
        assert_eq!(*h.controller.state(), WorkflowState::Completed { files: 2 });
        assert!(!h.controller.is_polling());
        let progress = h.controller.progress().unwrap();
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.file_count, 2);
        assert_eq!(
            h.notifier.of_level(Level::Info),
            vec!["2 file(s) uploaded".to_string()]
        );
        assert_eq!(
            *h.service.checked_names.lock().unwrap(),
            vec![vec!["a.txt".to_string(), "b.txt".to_string()]]
        );
        assert_eq!(
            h.strategy.uploaded_names(),
            vec![vec!["a.txt".to_string(), "b.txt".to_string()]]
        );

        assert!(!h.controller.is_closed());
        step(&mut h.controller).await;
        assert!(h.controller.is_closed());
    }

    #[tokio::test]
    async fn test_existing_name_enters_overwrite_and_can_be_skipped() {
        let report = ConflictReport {
            existing_names: ["a.txt".to_string()].into_iter().collect(),
            ..ConflictReport::default()
        };
        let mut h = harness(
            FakeService::with_report(report),
            FakeStrategy::succeeding(),
            &[("a.txt", 20), ("b.txt", 10)],
        );

        h.controller.commit();
        step(&mut h.controller).await;
        assert!(matches!(h.controller.state(), WorkflowState::Overwrite { .. }));
        assert!(!h.controller.controls().add_files.enabled);

        let entries = h.controller.conflict_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
        assert!(entries[0].checked);

        assert!(!h.controller.add_files(vec![FileCandidate::from_bytes("c.txt", vec![1])]));
        assert!(!h.controller.toggle_selection("b.txt", false));
        assert!(h.controller.toggle_selection("a.txt", false));
        assert!(!h.controller.conflict_entries()[0].checked);

        assert!(h.controller.commit());
        assert_eq!(*h.controller.state(), WorkflowState::Uploading);
        step(&mut h.controller).await;

        assert_eq!(h.service.checked_names.lock().unwrap().len(), 1);
        assert_eq!(h.strategy.uploaded_names(), vec![vec!["b.txt".to_string()]]);
        assert_eq!(*h.controller.state(), WorkflowState::Completed { files: 1 });
    }

    #[tokio::test]
    async fn test_invalid_names_are_dropped_without_override() {
        let report = ConflictReport {
            invalid_names: ["b?.txt".to_string()].into_iter().collect(),
            ..ConflictReport::default()
        };
        let mut h = harness(
            FakeService::with_report(report),
            FakeStrategy::succeeding(),
            &[("a.txt", 1), ("b?.txt", 1)],
        );

        h.controller.commit();
        step(&mut h.controller).await;

        let entries = h.controller.conflict_entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].selectable());
        assert!(!h.controller.selection().is_included("b?.txt"));
        assert!(!h.controller.toggle_selection("b?.txt", true));

        h.controller.commit();
        step(&mut h.controller).await;
        assert_eq!(h.strategy.uploaded_names(), vec![vec!["a.txt".to_string()]]);
    }

    #[tokio::test]
    async fn test_unchecking_every_conflict_returns_to_selection() {
        let report = ConflictReport {
            existing_names: ["a.txt".to_string()].into_iter().collect(),
            ..ConflictReport::default()
        };
        let mut h = harness(
            FakeService::with_report(report),
            FakeStrategy::succeeding(),
            &[("a.txt", 1)],
        );

        h.controller.commit();
        step(&mut h.controller).await;
        h.controller.toggle_selection("a.txt", false);

        assert!(!h.controller.controls().commit.enabled);
        assert!(!h.controller.commit());
        assert!(matches!(h.controller.state(), WorkflowState::Overwrite { .. }));
    }

    #[tokio::test]
    async fn test_busy_server_returns_to_selection_with_warning() {
        let report = ConflictReport {
            session_active: true,
            ..ConflictReport::default()
        };
        let mut h = harness(
            FakeService::with_report(report),
            FakeStrategy::succeeding(),
            &[("a.txt", 1), ("b.txt", 2)],
        );

        h.controller.commit();
        step(&mut h.controller).await;

        assert_eq!(*h.controller.state(), WorkflowState::Selection);
        assert!(h.controller.controls().commit.enabled);
        assert_eq!(h.notifier.of_level(Level::Warning).len(), 1);
        assert_eq!(h.controller.selection().len(), 2);
        assert_eq!(h.controller.summary().file_count, 2);
        assert!(h.strategy.uploaded_names().is_empty());
    }

    #[tokio::test]
    async fn test_failed_check_returns_to_selection() {
        let mut h = harness(
            FakeService::failing_check(),
            FakeStrategy::succeeding(),
            &[("a.txt", 1)],
        );

        h.controller.commit();
        step(&mut h.controller).await;

        assert_eq!(*h.controller.state(), WorkflowState::Selection);
        assert!(h.controller.controls().commit.enabled);
        let errors = h.notifier.of_level(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("503"));
    }

    #[tokio::test]
    async fn test_progress_index_maps_to_ordered_names() {
        let mut h = start_holding_upload(&[("c.txt", 1), ("A.txt", 1), ("b.txt", 1)]).await;
        let epoch = h.controller.epoch();

        let mut shown = Vec::new();
        for current in [1, 2, 2, 3] {
            h.controller.handle_event(SessionEvent::Progress {
                epoch,
                result: Ok(snapshot(current, 50, true)),
            });
            shown.push(h.controller.progress().unwrap().file_name.clone().unwrap());
        }
        assert_eq!(shown, vec!["A.txt", "b.txt", "b.txt", "c.txt"]);
        assert!(h.controller.is_polling());
    }

    #[tokio::test]
    async fn test_baseline_is_selected_total() {
        let mut h = start_holding_upload(&[("a.txt", 20), ("b.txt", 10)]).await;
        let epoch = h.controller.epoch();
        assert_eq!(h.controller.progress().unwrap().total_bytes, 30);

        h.controller.handle_event(SessionEvent::Progress {
            epoch,
            result: Ok(ProgressSnapshot {
                current_file: 1,
                percent: 50,
                running: true,
                content_length: 4000,
            }),
        });
        let progress = h.controller.progress().unwrap();
        assert_eq!(progress.total_bytes, 30);
        assert_eq!(progress.bytes_read, 15);
    }

    #[tokio::test]
    async fn test_failed_outcome_shows_error_and_stops_polling() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let epoch = h.controller.epoch();
        assert!(h.controller.is_polling());

        h.controller.handle_event(SessionEvent::TransferFinished {
            epoch,
            result: Ok(TransferOutcome {
                success: false,
                message: "X".to_string(),
                stacktrace: "Y".to_string(),
                request_size: 0,
            }),
        });

        assert_eq!(
            *h.controller.state(),
            WorkflowState::Error {
                message: "X".to_string(),
                stacktrace: "Y".to_string(),
            }
        );
        assert!(!h.controller.is_polling());
        assert!(!h.controller.is_closed());

        h.controller.acknowledge();
        assert!(h.controller.is_closed());
    }

    #[tokio::test]
    async fn test_transport_error_carries_cause() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let epoch = h.controller.epoch();

        h.controller.handle_event(SessionEvent::TransferFinished {
            epoch,
            result: Err(UploadError::Status {
                url: "http://cms.local/upload".to_string(),
                status: 502,
                body: "bad gateway".to_string(),
            }),
        });

        match h.controller.state() {
            WorkflowState::Error { message, stacktrace } => {
                assert!(message.contains("502"));
                assert!(stacktrace.contains("bad gateway"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let mut h = start_holding_upload(&[("a.txt", 10), ("b.txt", 10)]).await;
        let stale = h.controller.epoch() - 1;
        let before = h.controller.progress().cloned();

        h.controller.handle_event(SessionEvent::Progress {
            epoch: stale,
            result: Ok(snapshot(2, 90, true)),
        });
        h.controller.handle_event(SessionEvent::TransferFinished {
            epoch: stale,
            result: Ok(TransferOutcome::default()),
        });

        assert_eq!(h.controller.progress().cloned(), before);
        assert_eq!(*h.controller.state(), WorkflowState::Uploading);
    }

    #[tokio::test]
    async fn test_not_running_stops_polling_once() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let epoch = h.controller.epoch();

        h.controller.handle_event(SessionEvent::Progress {
            epoch,
            result: Ok(snapshot(1, 100, false)),
        });
        assert!(!h.controller.is_polling());

        h.controller.stop_polling();
        h.controller.stop_polling();
        assert!(!h.controller.is_polling());
        assert_eq!(*h.controller.state(), WorkflowState::Uploading);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_polling() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let epoch = h.controller.epoch();

        h.controller.handle_event(SessionEvent::Progress {
            epoch,
            result: Err(UploadError::Canceled),
        });
        assert!(h.controller.is_polling());
    }

    #[tokio::test]
    async fn test_loading_indicator_cleared_on_finish() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let epoch = h.controller.epoch();

        h.controller
            .handle_event(SessionEvent::LocalLoading { epoch, active: true });
        assert!(h.controller.is_loading_local());

        h.controller.handle_event(SessionEvent::TransferFinished {
            epoch,
            result: Ok(TransferOutcome {
                success: true,
                request_size: 5,
                ..TransferOutcome::default()
            }),
        });
        assert!(!h.controller.is_loading_local());
    }

    #[tokio::test]
    async fn test_cancel_during_upload_notifies_server() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let old_epoch = h.controller.epoch();

        h.controller.cancel();
        assert_eq!(*h.controller.state(), WorkflowState::Canceled);
        assert!(h.controller.is_closed());
        assert!(!h.controller.is_polling());

        for _ in 0..100 {
            if h.service.cancel_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.service.cancel_count(), 1);

        h.controller.handle_event(SessionEvent::TransferFinished {
            epoch: old_epoch,
            result: Ok(TransferOutcome::default()),
        });
        assert_eq!(*h.controller.state(), WorkflowState::Canceled);

        h.controller.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.service.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_upload_skips_server() {
        let mut h = harness(
            FakeService::default(),
            FakeStrategy::succeeding(),
            &[("a.txt", 1)],
        );

        h.controller.cancel();
        assert_eq!(*h.controller.state(), WorkflowState::Canceled);
        assert!(h.controller.is_closed());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.service.cancel_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_warns_and_stays_excluded() {
        let mut h = harness_with_limit(
            FakeService::default(),
            FakeStrategy::succeeding(),
            &[],
            Some(100),
        );

        assert!(h.controller.add_files(vec![
            FileCandidate::from_bytes("fits.bin", vec![0; 100]),
            FileCandidate::from_bytes("huge.bin", vec![0; 101]),
        ]));
        assert!(h.controller.selection().is_included("fits.bin"));
        assert!(!h.controller.selection().is_included("huge.bin"));

        let warnings = h.notifier.of_level(Level::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("huge.bin"));
    }

    #[tokio::test]
    async fn test_controls_locked_while_uploading() {
        let mut h = start_holding_upload(&[("a.txt", 1)]).await;
        let controls = h.controller.controls();
        assert!(!controls.commit.enabled);
        assert_eq!(controls.add_files.reason, Some("upload running"));
        assert!(!h.controller.commit());
        assert!(!h.controller.toggle_selection("a.txt", false));
    }

    #[tokio::test]
    async fn test_pump_drains_queued_events() {
        let mut h = harness(
            FakeService::default(),
            FakeStrategy::holding(),
            &[("a.txt", 1)],
        );
        h.controller.commit();

        for _ in 0..100 {
            if h.controller.pump() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*h.controller.state(), WorkflowState::Uploading);
    }
}
