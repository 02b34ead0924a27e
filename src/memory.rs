//! In-memory host for deterministic tests and embedding without a browser.
//!
//! `MemoryPage` records attached scripts and only fires their load listeners
//! when asked to, so callers control exactly when "the network" finishes.
//! `RecordingHub` stands in for `MathJax.Hub`: it records every call and holds
//! typeset jobs in a FIFO queue until [`RecordingHub::process_queue`] runs.

use crate::dom::{Callback, Document, ElementHandle, GlobalScope, MathJaxHub, ScriptElement};
use crate::HubConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call observed by [`RecordingHub`]
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// `Hub.Config` was applied
    Config(HubConfig),
    /// `Hub.Configured` released the startup gate
    Configured,
    /// A typeset job was enqueued
    Queued(ElementHandle),
    /// A typeset job ran
    Typeset(ElementHandle),
}

/// Recording stand-in for `MathJax.Hub`
#[derive(Default)]
pub struct RecordingHub {
    events: Mutex<Vec<HubEvent>>,
    queue: Mutex<VecDeque<(ElementHandle, Callback)>>,
    config_failure: Mutex<Option<String>>,
    gate_failure: Mutex<Option<String>>,
    enqueue_failure: Mutex<Option<String>>,
}

impl RecordingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `config` calls fail with `message`
    pub fn fail_config(&self, message: impl Into<String>) {
        *lock(&self.config_failure) = Some(message.into());
    }

    /// Make subsequent `configured` calls fail with `message`
    pub fn fail_configured(&self, message: impl Into<String>) {
        *lock(&self.gate_failure) = Some(message.into());
    }

    /// Make subsequent `queue_typeset` calls fail with `message`
    pub fn fail_enqueue(&self, message: impl Into<String>) {
        *lock(&self.enqueue_failure) = Some(message.into());
    }

    pub fn events(&self) -> Vec<HubEvent> {
        lock(&self.events).clone()
    }

    pub fn config_calls(&self) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| matches!(e, HubEvent::Config(_)))
            .count()
    }

    /// The configuration most recently applied, if any
    pub fn applied_config(&self) -> Option<HubConfig> {
        lock(&self.events).iter().rev().find_map(|e| match e {
            HubEvent::Config(c) => Some(c.clone()),
            _ => None,
        })
    }

    pub fn is_configured(&self) -> bool {
        lock(&self.events).contains(&HubEvent::Configured)
    }

    pub fn pending_jobs(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Containers typeset so far, in completion order
    pub fn typeset_containers(&self) -> Vec<ElementHandle> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                HubEvent::Typeset(el) => Some(el.clone()),
                _ => None,
            })
            .collect()
    }

    /// Discard queued jobs without running them, as a torn-down page would.
    /// Returns the number of jobs dropped.
    pub fn abandon_queue(&self) -> usize {
        let jobs = std::mem::take(&mut *lock(&self.queue));
        jobs.len()
    }

    /// Run queued jobs in order, including any enqueued by their callbacks.
    /// Returns the number of jobs run.
    pub fn process_queue(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = lock(&self.queue).pop_front();
            let Some((container, done)) = job else {
                return ran;
            };
            lock(&self.events).push(HubEvent::Typeset(container));
            done();
            ran += 1;
        }
    }
}

impl MathJaxHub for RecordingHub {
    fn config(&self, config: &HubConfig) -> Result<(), String> {
        if let Some(message) = lock(&self.config_failure).clone() {
            return Err(message);
        }
        lock(&self.events).push(HubEvent::Config(config.clone()));
        Ok(())
    }

    fn configured(&self) -> Result<(), String> {
        if let Some(message) = lock(&self.gate_failure).clone() {
            return Err(message);
        }
        lock(&self.events).push(HubEvent::Configured);
        Ok(())
    }

    fn queue_typeset(&self, container: &ElementHandle, done: Callback) -> Result<(), String> {
        if let Some(message) = lock(&self.enqueue_failure).clone() {
            return Err(message);
        }
        lock(&self.events).push(HubEvent::Queued(container.clone()));
        lock(&self.queue).push_back((container.clone(), done));
        Ok(())
    }
}

/// In-memory document and global scope
pub struct MemoryPage {
    head: Mutex<Vec<ScriptElement>>,
    library: Mutex<Option<Arc<RecordingHub>>>,
    insertion_failure: Mutex<Option<String>>,
    binds_on_load: AtomicBool,
}

impl MemoryPage {
    /// A page without the library bound
    pub fn new() -> Self {
        MemoryPage {
            head: Mutex::new(Vec::new()),
            library: Mutex::new(None),
            insertion_failure: Mutex::new(None),
            binds_on_load: AtomicBool::new(true),
        }
    }

    /// A page where the library global is already defined
    pub fn with_library() -> Self {
        let page = Self::new();
        page.bind_library();
        page
    }

    /// Define the library global, returning its hub
    pub fn bind_library(&self) -> Arc<RecordingHub> {
        lock(&self.library)
            .get_or_insert_with(|| Arc::new(RecordingHub::new()))
            .clone()
    }

    pub fn hub(&self) -> Option<Arc<RecordingHub>> {
        lock(&self.library).clone()
    }

    /// Make subsequent head insertions fail with `message`
    pub fn fail_insertions(&self, message: impl Into<String>) {
        *lock(&self.insertion_failure) = Some(message.into());
    }

    /// Whether completing a script load defines the library global (default: true)
    pub fn set_binds_on_load(&self, binds: bool) {
        self.binds_on_load.store(binds, Ordering::SeqCst);
    }

    /// `src` of every script attached to the head, in insertion order
    pub fn scripts(&self) -> Vec<String> {
        lock(&self.head).iter().map(|s| s.src.clone()).collect()
    }

    /// `type` of every script attached to the head, in insertion order
    pub fn script_types(&self) -> Vec<String> {
        lock(&self.head).iter().map(|s| s.script_type.clone()).collect()
    }

    /// Simulate the script at `index` finishing loading and executing.
    ///
    /// Returns `false` when there is no such script.
    pub fn complete_script_load(&self, index: usize) -> bool {
        let listeners = match lock(&self.head).get_mut(index) {
            Some(script) => script.take_load_listeners(),
            None => return false,
        };
        if self.binds_on_load.load(Ordering::SeqCst) {
            self.bind_library();
        }
        for listener in listeners {
            listener();
        }
        true
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryPage {
    fn append_to_head(&self, script: ScriptElement) -> Result<(), String> {
        if let Some(message) = lock(&self.insertion_failure).clone() {
            return Err(message);
        }
        lock(&self.head).push(script);
        Ok(())
    }
}

impl GlobalScope for MemoryPage {
    fn math_jax(&self) -> Result<Option<Arc<dyn MathJaxHub>>, String> {
        Ok(lock(&self.library)
            .clone()
            .map(|hub| hub as Arc<dyn MathJaxHub>))
    }
}
