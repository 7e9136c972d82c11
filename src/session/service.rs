use super::events::{Alert, SessionEvent, SessionEventHandle};
use crate::config::Config;
use crate::convert::ConversionClient;
use crate::file_set::{
    decode_native_text, AddFilesResult, FileSetError, FileSetManager, IngestJob, IngestOutcome,
    IngestResult, ListItem,
};
use crate::merge::{preflight, MergeArtifact, MergeClient, MergeError, MergeMode};
use crate::models::{EntryId, SourceFile, Viewport};
use crate::render::{LazyRenderer, MapSurface, RenderError, TrackRenderer};
use crate::view_sync::{CompletionOutcome, RenderCompletion, ViewSynchronizer};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session has shut down")]
    Closed,
    #[error(transparent)]
    FileSet(#[from] FileSetError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// External collaborators the session depends on
pub struct SessionCollaborators {
    pub converter: Arc<dyn ConversionClient>,
    pub renderer: Arc<dyn TrackRenderer>,
    pub merger: Arc<dyn MergeClient>,
    pub map: Box<dyn MapSurface>,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub items: Vec<ListItem>,
    pub viewport: Viewport,
    pub generation: u64,
    pub in_flight: usize,
    pub settled: bool,
}

/// Commands sent to the session
enum SessionCommand {
    AddFiles(Vec<SourceFile>),
    ReplaceFiles(Vec<SourceFile>),
    RemoveFile {
        index: usize,
        reply: oneshot::Sender<Result<String, FileSetError>>,
    },
    Merge {
        mode: MergeMode,
        reply: oneshot::Sender<Result<Option<MergeArtifact>, MergeError>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    WaitSettled(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Results of asynchronous work, fed back into the session loop
enum Completion {
    Ingested {
        entry_id: EntryId,
        outcome: IngestOutcome,
    },
    Rendered(RenderCompletion),
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: tokio_mpsc::UnboundedSender<SessionCommand>,
    event_handle: SessionEventHandle,
}

impl SessionHandle {
    /// Add the selected files, draining the selection so the same files can
    /// be selected again later
    pub fn add_files(&self, selection: &mut Vec<SourceFile>) -> Result<(), SessionError> {
        let files: Vec<SourceFile> = selection.drain(..).collect();
        self.send(SessionCommand::AddFiles(files))
    }

    /// Replace the whole set with a new selection
    pub fn replace_files(&self, selection: &mut Vec<SourceFile>) -> Result<(), SessionError> {
        let files: Vec<SourceFile> = selection.drain(..).collect();
        self.send(SessionCommand::ReplaceFiles(files))
    }

    /// Remove the entry at `index`, returning the removed file's name
    pub async fn remove_file(&self, index: usize) -> Result<String, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::RemoveFile { index, reply })?;
        Ok(rx.await.map_err(|_| SessionError::Closed)??)
    }

    /// Request a merged file. Returns `None` without sending anything when
    /// the set is empty.
    pub async fn merge(&self, mode: MergeMode) -> Result<Option<MergeArtifact>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Merge { mode, reply })?;
        Ok(rx.await.map_err(|_| SessionError::Closed)??)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(reply))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Resolves once no ingestion is outstanding and every render of the
    /// current generation has reported
    pub async fn wait_until_settled(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::WaitSettled(reply))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }

    pub fn subscribe_events(&self) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        self.event_handle.subscribe_all()
    }

    pub fn subscribe_alerts(&self) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        self.event_handle.subscribe_alerts()
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .map_err(|_| SessionError::Closed)
    }
}

/// Owns the file set and the view for one session.
///
/// All state lives in a single task. Reads, conversions, renders and merges
/// run as separate tasks and report back through the completion channel, so
/// entry and view state have exactly one writer.
pub struct SessionService {
    files: FileSetManager,
    view: ViewSynchronizer,
    converter: Arc<dyn ConversionClient>,
    renderer: LazyRenderer,
    merger: Arc<dyn MergeClient>,
    max_upload_bytes: u64,
    command_rx: tokio_mpsc::UnboundedReceiver<SessionCommand>,
    completion_tx: tokio_mpsc::UnboundedSender<Completion>,
    completion_rx: tokio_mpsc::UnboundedReceiver<Completion>,
    event_tx: tokio_mpsc::UnboundedSender<SessionEvent>,
    settle_waiters: Vec<oneshot::Sender<SessionSnapshot>>,
    renderer_alerted: bool,
}

impl SessionService {
    /// Start the session task, returning handle for sending commands
    pub fn start(
        runtime_handle: tokio::runtime::Handle,
        config: &Config,
        collaborators: SessionCollaborators,
    ) -> SessionHandle {
        let (command_tx, command_rx) = tokio_mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = tokio_mpsc::unbounded_channel();
        let (event_tx, event_rx) = tokio_mpsc::unbounded_channel();

        let event_handle = SessionEventHandle::new(event_rx, runtime_handle.clone());

        let service = SessionService {
            files: FileSetManager::new(),
            view: ViewSynchronizer::new(collaborators.map, config.palette.clone()),
            converter: collaborators.converter,
            renderer: LazyRenderer::new(collaborators.renderer, config.renderer_load_timeout),
            merger: collaborators.merger,
            max_upload_bytes: config.max_upload_bytes,
            command_rx,
            completion_tx,
            completion_rx,
            event_tx,
            settle_waiters: Vec::new(),
            renderer_alerted: false,
        };

        runtime_handle.spawn(service.run());

        SessionHandle {
            command_tx,
            event_handle,
        }
    }

    async fn run(mut self) {
        info!("Session started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
            }
            self.notify_settle_waiters();
        }

        info!("Session closed with {} files", self.files.len());
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::AddFiles(files) => {
                let result = self.files.add_files(files);
                self.after_add(result);
            }
            SessionCommand::ReplaceFiles(files) => {
                let result = self.files.replace_files(files);
                self.after_add(result);
            }
            SessionCommand::RemoveFile { index, reply } => {
                let result = self.files.remove_file(index).map(|entry| {
                    info!("Removed {} from position {}", entry.source.name, index + 1);
                    entry.source.name
                });
                if result.is_ok() {
                    self.on_file_set_changed();
                }
                let _ = reply.send(result);
            }
            SessionCommand::Merge { mode, reply } => self.start_merge(mode, reply),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::WaitSettled(reply) => self.settle_waiters.push(reply),
            SessionCommand::Shutdown => {}
        }
    }

    fn after_add(&mut self, result: AddFilesResult) {
        debug!(
            "Added {} files, skipped {} duplicates",
            result.added,
            result.skipped.len()
        );
        for job in result.jobs {
            self.spawn_ingest(job);
        }
        self.on_file_set_changed();
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Ingested { entry_id, outcome } => {
                match self.files.complete_ingest(entry_id, outcome) {
                    IngestResult::Discarded => {
                        self.emit(SessionEvent::IngestDiscarded { entry_id });
                    }
                    IngestResult::ConversionFailed {
                        file_name, reason, ..
                    } => {
                        self.emit(SessionEvent::Alert(Alert::ConversionFailed {
                            file_name,
                            reason,
                        }));
                        self.on_file_set_changed();
                    }
                    IngestResult::Ready { .. } | IngestResult::ReadFailed { .. } => {
                        self.on_file_set_changed();
                    }
                }
            }
            Completion::Rendered(completion) => self.on_rendered(completion),
        }
    }

    /// Re-render the list and rebuild the map from scratch
    fn on_file_set_changed(&mut self) {
        self.emit(SessionEvent::FileListChanged {
            items: self.files.display_list(self.view.palette()),
        });

        let requests = self.view.rebuild(self.files.entries());
        if requests.is_empty() {
            self.emit(SessionEvent::CycleSettled {
                generation: self.view.generation(),
                viewport: None,
            });
            return;
        }

        for request in requests {
            let renderer = self.renderer.clone();
            let tx = self.completion_tx.clone();
            tokio::spawn(async move {
                let result = renderer.render(&request.preview_text).await;
                let _ = tx.send(Completion::Rendered(RenderCompletion { request, result }));
            });
        }
    }

    fn on_rendered(&mut self, completion: RenderCompletion) {
        let generation = completion.request.generation;

        // One alert per outage: re-armed once a render gets past loading
        match &completion.result {
            Err(e @ (RenderError::LoadFailed(_) | RenderError::LoadTimedOut(_))) => {
                if !self.renderer_alerted {
                    self.renderer_alerted = true;
                    self.emit(SessionEvent::Alert(Alert::RendererUnavailable {
                        reason: e.to_string(),
                    }));
                }
            }
            _ => self.renderer_alerted = false,
        }

        match self.view.on_render_complete(completion) {
            CompletionOutcome::Settled { viewport } => {
                if let Some(bounds) = viewport {
                    self.emit(SessionEvent::ViewportApplied { generation, bounds });
                }
                self.emit(SessionEvent::CycleSettled {
                    generation,
                    viewport,
                });
            }
            CompletionOutcome::Pending { .. } | CompletionOutcome::Stale => {}
        }
    }

    fn spawn_ingest(&self, job: IngestJob) {
        let tx = self.completion_tx.clone();

        match job {
            IngestJob::ReadNative { entry_id, source } => {
                tokio::spawn(async move {
                    let bytes = source.bytes.clone();
                    let outcome =
                        match tokio::task::spawn_blocking(move || decode_native_text(&bytes)).await
                        {
                            Ok(Ok(text)) => IngestOutcome::Parsed(text),
                            Ok(Err(e)) => IngestOutcome::ReadFailed(e.to_string()),
                            Err(e) => IngestOutcome::ReadFailed(e.to_string()),
                        };
                    let _ = tx.send(Completion::Ingested { entry_id, outcome });
                });
            }
            IngestJob::Convert { entry_id, source } => {
                let converter = self.converter.clone();
                tokio::spawn(async move {
                    let outcome = match converter.convert(&source).await {
                        Ok(text) => IngestOutcome::Converted(text),
                        Err(e) => {
                            warn!("Conversion of {} failed: {}", source.name, e);
                            IngestOutcome::ConversionFailed(e.to_string())
                        }
                    };
                    let _ = tx.send(Completion::Ingested { entry_id, outcome });
                });
            }
        }
    }

    fn start_merge(
        &self,
        mode: MergeMode,
        reply: oneshot::Sender<Result<Option<MergeArtifact>, MergeError>>,
    ) {
        if self.files.is_empty() {
            debug!("Merge requested with no files, nothing to send");
            let _ = reply.send(Ok(None));
            return;
        }

        let files = self.files.sources();
        let merger = self.merger.clone();
        let event_tx = self.event_tx.clone();
        let max_upload_bytes = self.max_upload_bytes;

        tokio::spawn(async move {
            let result = match preflight(&files, max_upload_bytes) {
                Ok(()) => merger.merge(&files, mode).await,
                Err(e) => Err(e),
            };

            match &result {
                Ok(artifact) => {
                    let _ = event_tx.send(SessionEvent::MergeReady {
                        file_name: artifact.file_name.clone(),
                        size: artifact.len(),
                    });
                }
                Err(e) => {
                    error!("Merge failed: {}", e);
                    let _ = event_tx.send(SessionEvent::Alert(Alert::MergeFailed {
                        message: e.user_message(),
                    }));
                }
            }

            let _ = reply.send(result.map(Some));
        });
    }

    fn is_settled(&self) -> bool {
        self.files.in_flight_count() == 0 && self.view.is_settled()
    }

    fn notify_settle_waiters(&mut self) {
        if self.settle_waiters.is_empty() || !self.is_settled() {
            return;
        }
        let snapshot = self.snapshot();
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(snapshot.clone());
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            items: self.files.display_list(self.view.palette()),
            viewport: self.view.viewport(),
            generation: self.view.generation(),
            in_flight: self.files.in_flight_count(),
            settled: self.is_settled(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}
