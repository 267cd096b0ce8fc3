//! The viewing session: cache, source and viewer lifecycle.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{CacheFactory, CacheFile, TempCache};
use crate::diagnostics::{self, MetricsProvider, ProcessMetrics};
use crate::logging::LogSink;
use crate::session::error::{CycleError, Result, SessionError};
use crate::source::{LogSource, Tail};
use crate::viewer::{
    Action, Document, DocumentViewer, General, PagerFactory, RunOutcome, ViewerFactory,
};

/// Key bindings installed on every session viewer.
pub const KEY_BINDINGS: &[(Action, &[&str])] = &[
    (Action::PrevContainer, &["left"]),
    (Action::NextContainer, &["right"]),
    (Action::SystemReport, &["s"]),
    (Action::AllLogs, &["ctrl+y"]),
];

/// Where the session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing on screen yet.
    Idle,
    /// Viewer loop is showing a document.
    Running,
    /// An action is retiring/recreating the document.
    Navigating,
    /// Tearing down.
    ShuttingDown,
    /// Torn down; only `shutdown` may be called again (as a no-op).
    Closed,
}

/// Owns one cache/document pair at a time and swaps it on navigation.
///
/// Every cache the session creates is removed exactly once: by [`stop`]
/// before the next create-cycle, by the create-cycle itself when it fails
/// half way, or by [`shutdown`].
///
/// [`stop`]: Session::stop
/// [`shutdown`]: Session::shutdown
pub struct Session {
    source: Arc<dyn LogSource>,
    caches: Box<dyn CacheFactory>,
    viewers: Box<dyn ViewerFactory>,
    metrics: Box<dyn MetricsProvider>,
    log: LogSink,
    tail: Tail,
    scope: CancellationToken,
    active: Option<CacheFile>,
    viewer: Option<Box<dyn DocumentViewer>>,
    state: SessionState,
}

impl Session {
    /// Create a session with the default cache, pager and metrics.
    pub fn new(source: Arc<dyn LogSource>, tail: Tail) -> Self {
        Self {
            source,
            caches: Box::new(TempCache::default()),
            viewers: Box::new(PagerFactory),
            metrics: Box::new(ProcessMetrics::new()),
            log: LogSink::tracing(),
            tail,
            scope: CancellationToken::new(),
            active: None,
            viewer: None,
            state: SessionState::Idle,
        }
    }

    /// Use a different cache factory.
    pub fn with_caches(mut self, caches: impl CacheFactory + 'static) -> Self {
        self.caches = Box::new(caches);
        self
    }

    /// Use a different viewer factory.
    pub fn with_viewers(mut self, viewers: impl ViewerFactory + 'static) -> Self {
        self.viewers = Box::new(viewers);
        self
    }

    /// Use a different metrics provider.
    pub fn with_metrics(mut self, metrics: impl MetricsProvider + 'static) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    /// Use a different debug sink.
    pub fn with_log(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Configured tail for normal loads.
    pub fn tail(&self) -> Tail {
        self.tail
    }

    /// The session's cancellation scope.
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Path of the cache currently backing the viewer.
    pub fn active_cache(&self) -> Option<&std::path::Path> {
        self.active.as_ref().map(CacheFile::path)
    }

    /// Caption of the document currently shown.
    pub fn caption(&self) -> Option<&str> {
        self.viewer.as_ref().map(|v| v.caption())
    }

    /// Build the first document, set up the viewer and run it.
    ///
    /// Blocks until the user quits (`Ok`) or something fails. Failures from
    /// key actions come back as [`SessionError::Fatal`]. The caller is
    /// expected to call [`shutdown`](Self::shutdown) afterwards either way.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle || self.viewer.is_some() || self.active.is_some() {
            return Err(SessionError::NotRunning);
        }

        let (cache, document) = self
            .create_document(self.tail)
            .map_err(SessionError::CreateDocument)?;
        self.active = Some(cache);

        if let Err(e) = self.open_viewer(document) {
            if let Some(mut viewer) = self.viewer.take() {
                viewer.close();
            }
            self.stop();
            return Err(e);
        }

        self.state = SessionState::Running;
        tracing::info!("Session started on '{}'", self.source.name());

        self.run_loop()
    }

    /// Build the viewer around `document`, set display options and bind keys.
    fn open_viewer(&mut self, document: Document) -> Result<()> {
        let viewer = self
            .viewers
            .create(document)
            .map_err(SessionError::CreateViewer)?;
        let viewer = self.viewer.insert(viewer);

        viewer.set_general(General {
            follow_mode: true,
            wrap_mode: true,
        });

        for (action, keys) in KEY_BINDINGS {
            viewer
                .set_key_handler(*action, keys)
                .map_err(|source| SessionError::BindKey {
                    action: *action,
                    source,
                })?;
        }
        Ok(())
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            let viewer = self.viewer.as_mut().ok_or(SessionError::NotRunning)?;
            let outcome = viewer.run().map_err(SessionError::Run)?;

            match outcome {
                RunOutcome::Quit => {
                    tracing::info!("Viewer closed by user");
                    return Ok(());
                }
                RunOutcome::Action(action) => {
                    if let Err(e) = self.dispatch(action) {
                        tracing::error!(fatal = true, action = %action, "{}", e);
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Run the method bound to `action`.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        tracing::debug!("Dispatching {}", action);
        match action {
            Action::PrevContainer => self.prev_container(),
            Action::NextContainer => self.next_container(),
            Action::SystemReport => {
                self.system_report();
                Ok(())
            }
            Action::AllLogs => self.retrieve_all_logs(),
        }
    }

    /// Retire the active cache: halt the source, close and delete the file.
    ///
    /// Close/remove failures are logged, never returned.
    pub fn stop(&mut self) {
        self.source.stop();
        match self.active.take() {
            Some(cache) => retire(cache),
            None => tracing::debug!("No active cache to retire"),
        }
    }

    /// Run a create-cycle with the configured tail and show the result.
    pub fn new_document(&mut self) -> Result<()> {
        if self.viewer.is_none() {
            return Err(SessionError::NotRunning);
        }
        if self.active.is_some() {
            tracing::warn!("new_document called with a live cache, retiring it first");
            self.stop();
        }

        let (cache, document) = self
            .create_document(self.tail)
            .map_err(SessionError::CreateDocument)?;
        self.install(cache, document)
    }

    /// Switch to the previous container.
    pub fn prev_container(&mut self) -> Result<()> {
        self.navigate(Action::PrevContainer, |source| source.set_prev_container())
    }

    /// Switch to the next container.
    pub fn next_container(&mut self) -> Result<()> {
        self.navigate(Action::NextContainer, |source| source.set_next_container())
    }

    /// Stop, move the source pointer with `step`, then show the new document.
    ///
    /// The state goes back to `Running` either way; a failed swap comes back
    /// as [`SessionError::Fatal`] for the run loop to end the session.
    fn navigate(&mut self, action: Action, step: impl FnOnce(&dyn LogSource)) -> Result<()> {
        if self.viewer.is_none() {
            return Err(SessionError::fatal(action, SessionError::NotRunning));
        }
        self.state = SessionState::Navigating;
        self.stop();
        step(self.source.as_ref());

        let result = self
            .new_document()
            .map_err(|e| SessionError::fatal(action, e));
        self.state = SessionState::Running;
        result?;

        tracing::debug!("Now showing '{}'", self.source.name());
        Ok(())
    }

    /// Reload the current container with its whole history.
    pub fn retrieve_all_logs(&mut self) -> Result<()> {
        if self.viewer.is_none() {
            return Err(SessionError::fatal(Action::AllLogs, SessionError::NotRunning));
        }
        self.state = SessionState::Navigating;
        self.stop();

        let result = match self.create_document(Tail::All) {
            Ok((cache, document)) => self.install(cache, document),
            Err(e) => Err(SessionError::Cycle(e)),
        };
        self.state = SessionState::Running;
        result.map_err(|e| SessionError::fatal(Action::AllLogs, e))
    }

    /// Log a memory report to the session's debug sink.
    pub fn system_report(&mut self) {
        diagnostics::system_report(self.metrics.as_mut(), &self.log);
    }

    /// Close the viewer, cancel background streaming and delete the last
    /// cache. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            tracing::warn!("Session already shut down");
            return;
        }
        self.state = SessionState::ShuttingDown;

        if let Some(mut viewer) = self.viewer.take() {
            viewer.close();
        }
        self.scope.cancel();

        match self.active.take() {
            Some(mut cache) => {
                let path = cache.path().to_path_buf();
                cache.close();
                if let Err(e) = cache.remove() {
                    tracing::error!("Failed to remove cache file {}: {}", path.display(), e);
                }
            }
            None => tracing::debug!("No cache file to remove"),
        }

        self.state = SessionState::Closed;
        tracing::info!("Session shut down");
    }

    /// Allocate a cache, start streaming into it and open it as a document.
    ///
    /// If anything after the allocation fails the cache is removed again
    /// before the error is returned.
    fn create_document(
        &self,
        tail: Tail,
    ) -> std::result::Result<(CacheFile, Document), CycleError> {
        let pending = PendingCache(Some(self.caches.create()?));
        let cache = pending.get();

        let writer = cache.writer()?;
        self.source.load(&self.scope, writer, tail);

        let mut document = match self.viewers.open_document(cache.path()) {
            Ok(document) => document,
            Err(e) => {
                self.source.stop();
                return Err(e.into());
            }
        };

        document.caption = self.source.name();
        document.set_log(self.log.clone());

        Ok((pending.commit(), document))
    }

    fn install(&mut self, cache: CacheFile, document: Document) -> Result<()> {
        let Some(viewer) = self.viewer.as_mut() else {
            retire(cache);
            return Err(SessionError::NotRunning);
        };
        viewer.replace_document(document);
        self.active = Some(cache);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.state != SessionState::Idle || self.active.is_some() {
            tracing::warn!("Session dropped without shutdown(), cleaning up");
        }
        self.shutdown();
    }
}

/// Close and delete a cache, logging failures.
fn retire(mut cache: CacheFile) {
    let path = cache.path().to_path_buf();
    cache.close();
    match cache.remove() {
        Ok(()) => tracing::debug!("Retired cache file {}", path.display()),
        Err(e) => tracing::error!("Failed to remove cache file {}: {}", path.display(), e),
    }
}

/// Removes its cache on drop unless committed.
struct PendingCache(Option<CacheFile>);

impl PendingCache {
    fn get(&self) -> &CacheFile {
        match self.0 {
            Some(ref cache) => cache,
            None => unreachable!("pending cache used after commit"),
        }
    }

    fn commit(mut self) -> CacheFile {
        match self.0.take() {
            Some(cache) => cache,
            None => unreachable!("pending cache committed twice"),
        }
    }
}

impl Drop for PendingCache {
    fn drop(&mut self) {
        if let Some(cache) = self.0.take() {
            tracing::debug!("Create-cycle failed, removing {}", cache.path().display());
            retire(cache);
        }
    }
}
