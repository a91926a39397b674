//! Viewer facade
//!
//! The presentation layer talks to a `Viewer` only: it submits the viewport
//! it wants, drains messages from the background threads whenever it gets
//! the chance, and draws whatever `answer()` holds. No call here blocks on
//! file I/O except the explicit `wait`/`settle` helpers.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use super::indexer::Indexer;
use super::worker::{QueryJob, QueryWorker};
use super::{Notifier, Waker};
use crate::commands::Cmd;
use crate::config::ViewerConfig;
use crate::csv::Dialect;
use crate::index::SharedRowIndex;
use crate::messages::{IndexMsg, Msg, ViewportMsg};
use crate::model::{IndexStatus, ViewerModel};
use crate::query::{Answer, EngineSettings, QueryEngine, QueryError, QueryOutcome, Request};
use crate::update::update;

/// How the background indexer reads the file
#[derive(Debug, Clone, Copy)]
struct ScanSettings {
    read_size: usize,
    progress_rows: u64,
}

/// Start a scan of `path` from scratch into `index`
fn spawn_indexer(
    path: &Path,
    dialect: Dialect,
    scan: ScanSettings,
    index: &SharedRowIndex,
    notifier: Notifier,
) -> std::io::Result<Indexer> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut writer = index.writer();
    writer.reset();
    Indexer::spawn(
        file,
        file_len,
        dialect,
        scan.read_size,
        scan.progress_rows,
        writer,
        notifier,
    )
}

pub struct Viewer {
    model: ViewerModel,
    worker: QueryWorker,
    indexer: Option<Indexer>,
    scan: Option<ScanSettings>,
    index: SharedRowIndex,
    dialect: Dialect,
    path: Option<PathBuf>,
    notifier: Notifier,
    msg_rx: Receiver<Msg>,
}

impl Viewer {
    pub fn open(path: &Path, config: &ViewerConfig) -> std::io::Result<Self> {
        Self::open_with_waker(path, config, None)
    }

    /// Open `path`; `waker` runs whenever a background thread sends a message
    pub fn open_with_waker(
        path: &Path,
        config: &ViewerConfig,
        waker: Option<Waker>,
    ) -> std::io::Result<Self> {
        let dialect = config.dialect_for(path)?;
        let settings = config.engine_settings();
        let (msg_tx, msg_rx) = mpsc::channel();
        let notifier = Notifier::new(msg_tx, waker);

        let scan = config.background_index.then_some(ScanSettings {
            read_size: config.read_size,
            progress_rows: config.index_progress_rows,
        });
        let (engine, indexer) = if let Some(scan) = scan {
            let index = SharedRowIndex::new(settings.checkpoint_stride);
            let engine = QueryEngine::open_shared(path, dialect, settings, index.clone())?;
            let indexer = spawn_indexer(path, dialect, scan, &index, notifier.clone())?;
            (engine, Some(indexer))
        } else {
            (QueryEngine::open(path, dialect, settings)?, None)
        };

        tracing::info!(
            "Viewing {} (cell delimiter {:?}, background index {})",
            path.display(),
            dialect.cell_delimiter as char,
            indexer.is_some()
        );
        let mut viewer = Self::start(engine, indexer, notifier, msg_rx)?;
        viewer.path = Some(path.to_path_buf());
        viewer.scan = scan;
        Ok(viewer)
    }

    /// View an arbitrary source; the engine indexes it as queries go
    pub fn from_source<R>(
        source: R,
        dialect: Dialect,
        settings: EngineSettings,
    ) -> std::io::Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let (msg_tx, msg_rx) = mpsc::channel();
        let engine = QueryEngine::new(source, dialect, settings);
        Self::start(engine, None, Notifier::new(msg_tx, None), msg_rx)
    }

    fn start<R>(
        engine: QueryEngine<R>,
        indexer: Option<Indexer>,
        notifier: Notifier,
        msg_rx: Receiver<Msg>,
    ) -> std::io::Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let index = engine.index().clone();
        let dialect = engine.dialect();
        let worker = QueryWorker::spawn(engine, notifier.clone())?;
        Ok(Self {
            model: ViewerModel::new(),
            worker,
            indexer,
            scan: None,
            index,
            dialect,
            path: None,
            notifier,
            msg_rx,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn model(&self) -> &ViewerModel {
        &self.model
    }

    /// Row index as currently published
    pub fn index(&self) -> &SharedRowIndex {
        &self.index
    }

    pub fn index_status(&self) -> &IndexStatus {
        &self.model.index
    }

    /// Last good answer
    pub fn answer(&self) -> Option<&Answer> {
        self.model.answer()
    }

    pub fn last_error(&self) -> Option<&QueryError> {
        self.model.controller.last_error()
    }

    /// Ask for a viewport; returns true if a redraw is needed now
    pub fn submit_viewport(&mut self, request: Request) -> bool {
        self.apply(Msg::desired(request))
    }

    /// Recompute the current viewport
    pub fn refresh(&mut self) -> bool {
        self.apply(Msg::Viewport(ViewportMsg::Refresh))
    }

    /// Drain pending messages; returns true if a redraw is needed
    pub fn process_async_messages(&mut self) -> bool {
        let mut needs_redraw = false;
        while let Ok(msg) = self.msg_rx.try_recv() {
            needs_redraw |= self.apply(msg);
        }
        needs_redraw
    }

    /// Block for up to `timeout` for a message, then drain the rest
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.msg_rx.recv_timeout(timeout) {
            Ok(msg) => {
                let needs_redraw = self.apply(msg);
                self.process_async_messages() || needs_redraw
            }
            Err(_) => false,
        }
    }

    /// Pump messages until no query is running, or `timeout` passes
    pub fn settle(&mut self, timeout: Duration) -> Option<&Answer> {
        let deadline = Instant::now() + timeout;
        self.process_async_messages();
        while self.model.controller.is_busy() {
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("Viewer did not settle within {:?}", timeout);
                break;
            }
            self.wait(deadline - now);
        }
        self.answer()
    }

    /// Wait for the background index to finish and the view to catch up
    ///
    /// Returns false on timeout, on scan failure, or without an indexer.
    pub fn wait_for_index(&mut self, timeout: Duration) -> bool {
        if self.indexer.is_none() {
            return false;
        }
        let deadline = Instant::now() + timeout;
        self.process_async_messages();
        loop {
            match self.model.index {
                IndexStatus::Complete { .. } => break,
                IndexStatus::Failed(_) => return false,
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait(deadline - now);
        }
        self.settle(deadline.saturating_duration_since(Instant::now()));
        true
    }

    fn apply(&mut self, msg: Msg) -> bool {
        match update(&mut self.model, msg) {
            Some(cmd) => {
                let needs_redraw = cmd.needs_redraw();
                self.process_cmd(cmd);
                needs_redraw
            }
            None => false,
        }
    }

    fn process_cmd(&mut self, cmd: Cmd) {
        for cmd in cmd.into_leaves() {
            match cmd {
                Cmd::RunQuery { request, scratch } => {
                    if let Err(job) = self.worker.submit(QueryJob { request, scratch }) {
                        tracing::warn!("Query worker is gone");
                        // Settle the controller through the normal path
                        self.notifier.send(Msg::completed(QueryOutcome::new(
                            job.request,
                            Err(QueryError::Shutdown),
                        )));
                    }
                }
                Cmd::RestartIndex => self.restart_indexer(),
                Cmd::None | Cmd::Redraw | Cmd::Batch(_) => {}
            }
        }
    }

    /// Replace the background scan with a fresh one over the current file
    fn restart_indexer(&mut self) {
        let (Some(path), Some(scan)) = (self.path.as_deref(), self.scan) else {
            return;
        };
        if let Some(old) = self.indexer.take() {
            old.cancel();
        }
        match spawn_indexer(path, self.dialect, scan, &self.index, self.notifier.clone()) {
            Ok(indexer) => {
                tracing::info!("Rescanning {}", path.display());
                self.indexer = Some(indexer);
            }
            Err(e) => {
                tracing::warn!("Could not restart the index scan: {}", e);
                self.notifier.send(Msg::Index(IndexMsg::Failed(e.to_string())));
            }
        }
    }

    /// Stop the query thread; later queries fail with `Shutdown`
    pub fn stop_worker(&mut self) {
        self.worker.stop();
    }
}
