//! Host surface the renderer talks to: the document, its global scope and the
//! MathJax hub once the library is bound.
//!
//! Host implementations report failures as plain messages; the renderer tags
//! them with the entry point that triggered them.

use crate::HubConfig;
use std::fmt;
use std::sync::Arc;

/// A single-use completion callback
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

pub(crate) fn noop() -> Callback {
    Box::new(|| {})
}

/// Opaque reference to a DOM subtree root, expressed as a CSS selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(selector: impl Into<String>) -> Self {
        ElementHandle(selector.into())
    }

    pub fn selector(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementHandle {
    fn from(selector: &str) -> Self {
        ElementHandle::new(selector)
    }
}

/// A `<script>` element built by the renderer and handed to the document
pub struct ScriptElement {
    /// `type` attribute
    pub script_type: String,
    /// `src` attribute
    pub src: String,
    load_listeners: Vec<Callback>,
}

impl ScriptElement {
    pub fn new(script_type: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            script_type: script_type.into(),
            src: src.into(),
            load_listeners: Vec::new(),
        }
    }

    /// Register a listener for the element's `load` event
    pub fn add_load_listener(&mut self, listener: Callback) {
        self.load_listeners.push(listener);
    }

    pub fn has_load_listeners(&self) -> bool {
        !self.load_listeners.is_empty()
    }

    /// Detach the registered listeners so the host can fire them later.
    ///
    /// Listeners are one-shot: a second call returns an empty list.
    pub fn take_load_listeners(&mut self) -> Vec<Callback> {
        std::mem::take(&mut self.load_listeners)
    }

    /// Fire every registered load listener in registration order
    pub fn fire_load(&mut self) {
        for listener in self.take_load_listeners() {
            listener();
        }
    }
}

impl fmt::Debug for ScriptElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptElement")
            .field("script_type", &self.script_type)
            .field("src", &self.src)
            .field("load_listeners", &self.load_listeners.len())
            .finish()
    }
}

/// A live document the library script can be attached to
pub trait Document: Send + Sync {
    /// Append `script` under the head insertion point, starting its fetch.
    ///
    /// The host must eventually fire the element's load listeners once the
    /// script has executed. It may do so from inside this call.
    fn append_to_head(&self, script: ScriptElement) -> Result<(), String>;
}

/// The global environment the library binds itself into
pub trait GlobalScope: Send + Sync {
    /// The bound `MathJax` global, or `None` while it is undefined/null.
    ///
    /// `Err` means the scope could not be inspected at all.
    fn math_jax(&self) -> Result<Option<Arc<dyn MathJaxHub>>, String>;
}

/// The subset of `MathJax.Hub` used by the renderer
pub trait MathJaxHub: Send + Sync {
    /// `MathJax.Hub.Config(config)`
    fn config(&self, config: &HubConfig) -> Result<(), String>;

    /// `MathJax.Hub.Configured()`: releases the delayed startup
    fn configured(&self) -> Result<(), String>;

    /// `MathJax.Hub.Queue(["Typeset", MathJax.Hub, container], done)`
    fn queue_typeset(&self, container: &ElementHandle, done: Callback) -> Result<(), String>;
}
