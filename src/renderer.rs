//! Load-once MathJax renderer.
//!
//! `MathRenderer` owns the library's load state explicitly instead of relying
//! on the presence of the `MathJax` global alone. The first caller that finds
//! the library missing attaches the script; every caller that arrives while
//! the script is in flight queues behind that same load. Configuration runs
//! once, on the load signal, before any queued caller resumes.
//!
//! Each operation comes in two flavors: a callback form that mirrors the
//! host's event-driven model, and an async form built on top of it.

use crate::dom::{noop, Callback, Document, ElementHandle, GlobalScope, ScriptElement};
use crate::{Error, LoaderConfig, Result};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tokio::sync::oneshot;

static GLOBAL: OnceLock<MathRenderer> = OnceLock::new();

/// Observable load state of the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Ready,
}

enum LoadState {
    NotLoaded,
    Loading {
        waiters: Vec<Callback>,
        // set once the load signal has been taken, so a repeated signal cannot configure twice
        signaled: bool,
    },
    Ready,
}

struct Shared {
    config: LoaderConfig,
    globals: Arc<dyn GlobalScope>,
    state: Mutex<LoadState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> LoadStatus {
        match *self.state() {
            LoadState::NotLoaded => LoadStatus::NotLoaded,
            LoadState::Loading { .. } => LoadStatus::Loading,
            LoadState::Ready => LoadStatus::Ready,
        }
    }

    fn on_script_loaded(&self) {
        {
            let mut state = self.state();
            match &mut *state {
                LoadState::Loading { signaled, .. } if !*signaled => *signaled = true,
                _ => {
                    warn!("Ignoring unexpected {} load signal", self.config.library_name);
                    return;
                }
            }
        }

        debug!("{} script loaded; applying configuration", self.config.library_name);
        let outcome = match self.globals.math_jax() {
            Ok(Some(hub)) => hub
                .config(&self.config.hub)
                .and_then(|()| hub.configured()),
            Ok(None) => Err(format!(
                "{} is not defined after its script loaded",
                self.config.library_name
            )),
            Err(e) => Err(e),
        };

        let next = if outcome.is_ok() {
            LoadState::Ready
        } else {
            LoadState::NotLoaded
        };
        let waiters = match std::mem::replace(&mut *self.state(), next) {
            LoadState::Loading { waiters, .. } => waiters,
            _ => Vec::new(),
        };

        match outcome {
            Ok(()) => {
                info!(
                    "{} configured; resuming {} waiter(s)",
                    self.config.library_name,
                    waiters.len()
                );
                for waiter in waiters {
                    waiter();
                }
            }
            Err(e) => error!(
                "{} failed to initialize, dropping {} waiter(s): {}",
                self.config.library_name,
                waiters.len(),
                e
            ),
        }
    }
}

/// Loads MathJax into a document on demand and typesets DOM subtrees.
///
/// Cloning is cheap; clones share the same load state.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mathjax_loader::memory::MemoryPage;
/// use mathjax_loader::{ElementHandle, LoaderConfig, MathRenderer};
///
/// let page = Arc::new(MemoryPage::new());
/// let renderer = MathRenderer::new(LoaderConfig::default(), page.clone());
///
/// renderer.process_math(&*page, &ElementHandle::new("#output"), None)?;
/// page.complete_script_load(0);
/// page.hub().unwrap().process_queue();
///
/// assert_eq!(page.hub().unwrap().typeset_containers(), vec![ElementHandle::new("#output")]);
/// # Ok::<(), mathjax_loader::Error>(())
/// ```
#[derive(Clone)]
pub struct MathRenderer {
    shared: Arc<Shared>,
}

impl MathRenderer {
    /// Create a renderer bound to `globals`, the scope MathJax installs itself into.
    pub fn new(config: LoaderConfig, globals: Arc<dyn GlobalScope>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                globals,
                state: Mutex::new(LoadState::NotLoaded),
            }),
        }
    }

    /// Make this renderer the process-wide instance returned by [`MathRenderer::global`].
    pub fn install(self) -> Result<&'static MathRenderer> {
        let mut installed = false;
        let renderer = GLOBAL.get_or_init(|| {
            installed = true;
            self
        });
        if installed {
            Ok(renderer)
        } else {
            Err(Error::ConfigError(
                "a global MathRenderer is already installed".to_string(),
            ))
        }
    }

    /// The process-wide renderer, if one was installed
    pub fn global() -> Option<&'static MathRenderer> {
        GLOBAL.get()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.shared.config
    }

    pub fn status(&self) -> LoadStatus {
        self.shared.status()
    }

    /// Load and configure MathJax if necessary, then invoke `callback`.
    ///
    /// When the library is already available the callback runs before this
    /// returns. Otherwise it runs once the script's load signal has fired and
    /// the hub has been configured. Attachment failures are returned here and
    /// the callback is dropped without running.
    pub fn load_math_jax(&self, document: &dyn Document, callback: Option<Callback>) -> Result<()> {
        let callback = callback.unwrap_or_else(noop);
        let library = &self.shared.config.library_name;

        // A global bound before any load completed is taken as-is, including one
        // left behind by an earlier load whose configuration failed.
        let bound = self.status() == LoadStatus::NotLoaded
            && match self.shared.globals.math_jax() {
                Ok(hub) => hub.is_some(),
                Err(e) => {
                    warn!("Could not probe for {}: {}", library, e);
                    false
                }
            };

        let mut state = self.shared.state();
        if let LoadState::Loading { waiters, .. } = &mut *state {
            debug!("{} load already in flight; queueing caller", library);
            waiters.push(callback);
            return Ok(());
        }
        if bound || matches!(*state, LoadState::Ready) {
            if bound {
                debug!("{} already defined; skipping injection", library);
            }
            *state = LoadState::Ready;
            drop(state);
            callback();
            return Ok(());
        }

        let src = self
            .shared
            .config
            .script_src()
            .map_err(|e| Error::insertion(e.message()))?;
        let mut script = ScriptElement::new(self.shared.config.script_type.clone(), src);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        script.add_load_listener(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_script_loaded();
            }
        }));

        *state = LoadState::Loading {
            waiters: vec![callback],
            signaled: false,
        };
        drop(state);

        info!("Attaching {} script {}", library, script.src);
        if let Err(message) = document.append_to_head(script) {
            let dropped = {
                let mut state = self.shared.state();
                match std::mem::replace(&mut *state, LoadState::NotLoaded) {
                    LoadState::Loading { signaled: false, waiters } => waiters,
                    other => {
                        *state = other;
                        Vec::new()
                    }
                }
            };
            warn!(
                "Failed to attach {} script, dropping {} waiter(s): {}",
                library,
                dropped.len(),
                message
            );
            return Err(Error::insertion(message));
        }
        Ok(())
    }

    /// Queue a typeset job for `container`; `callback` runs when it completes.
    ///
    /// The library must already be loaded. This is not checked beyond the
    /// presence of the global: a missing global is reported as an enqueue
    /// failure.
    pub fn typeset_math(&self, container: &ElementHandle, callback: Option<Callback>) -> Result<()> {
        let callback = callback.unwrap_or_else(noop);
        let hub = self
            .shared
            .globals
            .math_jax()
            .map_err(Error::enqueue)?
            .ok_or_else(|| {
                Error::enqueue(format!("{} is not defined", self.shared.config.library_name))
            })?;
        debug!("Queueing typeset of {}", container);
        hub.queue_typeset(container, callback).map_err(Error::enqueue)
    }

    /// Load MathJax if necessary, then typeset `container`.
    ///
    /// An enqueue failure is returned to the caller when the library was
    /// already loaded. When the typeset is deferred to the load signal there
    /// is no caller left to return it to, so it is logged instead.
    pub fn process_math(
        &self,
        document: &dyn Document,
        container: &ElementHandle,
        callback: Option<Callback>,
    ) -> Result<()> {
        // .0: caller still inside process_math, .1: failure raised by a synchronous typeset
        let slot: Arc<Mutex<(bool, Option<Error>)>> = Arc::new(Mutex::new((true, None)));

        let renderer = self.clone();
        let container = container.clone();
        let deferred_slot = slot.clone();
        self.load_math_jax(
            document,
            Some(Box::new(move || {
                if let Err(e) = renderer.typeset_math(&container, callback) {
                    let mut slot = deferred_slot.lock().unwrap_or_else(PoisonError::into_inner);
                    if slot.0 {
                        slot.1 = Some(e);
                    } else {
                        error!("Deferred typeset of {} failed: {}", container, e);
                    }
                }
            })),
        )?;

        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.0 = false;
        match slot.1.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resolve once MathJax is loaded and configured.
    ///
    /// Insertion failures are reported before the first suspension point.
    /// Concurrent callers share a single in-flight load.
    pub async fn ensure_loaded(&self, document: &dyn Document) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.load_math_jax(
            document,
            Some(Box::new(move || {
                let _ = tx.send(());
            })),
        )?;
        rx.await
            .map_err(|_| Error::Canceled(format!("{} load did not complete", self.shared.config.library_name)))
    }

    /// Resolve once the typeset job for `container` has run.
    pub async fn typeset(&self, container: &ElementHandle) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.typeset_math(
            container,
            Some(Box::new(move || {
                let _ = tx.send(());
            })),
        )?;
        rx.await
            .map_err(|_| Error::Canceled(format!("typeset of {} did not complete", container)))
    }

    /// Load MathJax if necessary, then typeset `container`.
    pub async fn render(&self, document: &dyn Document, container: &ElementHandle) -> Result<()> {
        self.ensure_loaded(document).await?;
        self.typeset(container).await
    }
}
