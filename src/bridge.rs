//! Script bridge: drive MathJax inside a live page by evaluating JavaScript.
//!
//! The bridge implements [`Document`], [`GlobalScope`] and [`MathJaxHub`] on
//! top of any [`ScriptEngine`] able to evaluate code in the page context.
//! Events raised in the page (script `load`, typeset completion) come back as
//! console messages carrying [`SIGNAL_PREFIX`] and a numeric id; the host
//! forwards console output to [`ScriptBridge::handle_console`], which fires
//! the matching callbacks.

use crate::dom::{Callback, Document, ElementHandle, GlobalScope, MathJaxHub, ScriptElement};
use crate::{Error, HubConfig, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Prefix of console messages that carry page-side completion signals
pub const SIGNAL_PREFIX: &str = "__mathjax_loader:";

/// Result of JavaScript execution
#[derive(Debug, Clone)]
pub struct ScriptResult {
    /// Serialized result value
    pub value: String,
    /// Whether the script threw an error
    pub is_error: bool,
}

/// Anything that can evaluate JavaScript in a page's global context
pub trait ScriptEngine: Send {
    fn evaluate_script_in_page(&mut self, script: &str) -> Result<ScriptResult>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

fn signal_statement(id: u64) -> String {
    format!("console.log({});", js_string(&format!("{}{}", SIGNAL_PREFIX, id)))
}

/// Parse a console line of the form `__mathjax_loader:<id>`
pub fn parse_signal(text: &str) -> Option<u64> {
    text.trim().strip_prefix(SIGNAL_PREFIX)?.parse().ok()
}

/// JavaScript that attaches `script` under `<head>` and reports its
/// `load` event as signal `signal_id`.
pub fn injection_script(script: &ScriptElement, signal_id: u64) -> String {
    format!(
        "(function(){{var s=document.createElement(\"script\");s.type={};s.src={};\
         s.addEventListener(\"load\",function(){{{}}});\
         document.getElementsByTagName(\"head\")[0].appendChild(s);return true;}})()",
        js_string(&script.script_type),
        js_string(&script.src),
        signal_statement(signal_id)
    )
}

struct BridgeState<E> {
    engine: Mutex<E>,
    evaluating: AtomicBool,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Vec<Callback>>>,
    deferred: Mutex<Vec<u64>>,
    global_name: String,
}

/// Page bridge over a [`ScriptEngine`]
pub struct ScriptBridge<E> {
    state: Arc<BridgeState<E>>,
}

impl<E> Clone for ScriptBridge<E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<E: ScriptEngine + 'static> ScriptBridge<E> {
    pub fn new(engine: E) -> Self {
        Self::with_global_name(engine, "MathJax")
    }

    /// Use a different global binding name than `MathJax`
    pub fn with_global_name(engine: E, global_name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(BridgeState {
                engine: Mutex::new(engine),
                evaluating: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                deferred: Mutex::new(Vec::new()),
                global_name: global_name.into(),
            }),
        }
    }

    /// Number of signals still waiting for their console message
    pub fn pending_signals(&self) -> usize {
        lock(&self.state.pending).len()
    }

    /// Feed a console line from the page.
    ///
    /// Returns `true` when the line was a bridge signal. Signals delivered
    /// while a script is being evaluated are held until that evaluation
    /// returns.
    pub fn handle_console(&self, text: &str) -> bool {
        let Some(id) = parse_signal(text) else {
            return false;
        };
        lock(&self.state.deferred).push(id);
        if !self.state.evaluating.load(Ordering::SeqCst) {
            self.flush_signals();
        }
        true
    }

    fn register(&self, callbacks: Vec<Callback>) -> u64 {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.pending).insert(id, callbacks);
        id
    }

    fn unregister(&self, id: u64) {
        lock(&self.state.pending).remove(&id);
    }

    fn flush_signals(&self) {
        let ids = std::mem::take(&mut *lock(&self.state.deferred));
        for id in ids {
            let callbacks = lock(&self.state.pending).remove(&id);
            match callbacks {
                Some(callbacks) => {
                    debug!("Bridge signal {} fired", id);
                    for cb in callbacks {
                        cb();
                    }
                }
                None => warn!("Bridge signal {} has no pending callbacks", id),
            }
        }
    }

    fn eval(&self, script: &str) -> Result<String> {
        let result = {
            let mut engine = lock(&self.state.engine);
            self.state.evaluating.store(true, Ordering::SeqCst);
            let result = engine.evaluate_script_in_page(script);
            self.state.evaluating.store(false, Ordering::SeqCst);
            result
        };
        self.flush_signals();

        let result = result?;
        if result.is_error {
            return Err(Error::ScriptError(result.value));
        }
        Ok(result.value)
    }
}

impl<E: ScriptEngine + 'static> Document for ScriptBridge<E> {
    fn append_to_head(&self, mut script: ScriptElement) -> std::result::Result<(), String> {
        let id = self.register(script.take_load_listeners());
        let code = injection_script(&script, id);
        debug!("Injecting {} (signal {})", script.src, id);
        self.eval(&code).map(drop).map_err(|e| {
            self.unregister(id);
            e.message().to_string()
        })
    }
}

impl<E: ScriptEngine + 'static> GlobalScope for ScriptBridge<E> {
    fn math_jax(&self) -> std::result::Result<Option<Arc<dyn MathJaxHub>>, String> {
        let name = &self.state.global_name;
        let probe = format!("typeof {0} !== \"undefined\" && {0} !== null", name);
        let value = self.eval(&probe).map_err(|e| e.message().to_string())?;
        if value.trim() != "true" {
            return Ok(None);
        }
        Ok(Some(Arc::new(BridgeHub {
            bridge: self.clone(),
        })))
    }
}

struct BridgeHub<E> {
    bridge: ScriptBridge<E>,
}

impl<E: ScriptEngine + 'static> MathJaxHub for BridgeHub<E> {
    fn config(&self, config: &HubConfig) -> std::result::Result<(), String> {
        let json = serde_json::to_string(config).map_err(|e| e.to_string())?;
        let code = format!("{}.Hub.Config({});", self.bridge.state.global_name, json);
        self.bridge
            .eval(&code)
            .map(drop)
            .map_err(|e| e.message().to_string())
    }

    fn configured(&self) -> std::result::Result<(), String> {
        let code = format!("{}.Hub.Configured();", self.bridge.state.global_name);
        self.bridge
            .eval(&code)
            .map(drop)
            .map_err(|e| e.message().to_string())
    }

    fn queue_typeset(&self, container: &ElementHandle, done: Callback) -> std::result::Result<(), String> {
        let id = self.bridge.register(vec![done]);
        let name = &self.bridge.state.global_name;
        let code = format!(
            "{0}.Hub.Queue([\"Typeset\",{0}.Hub,document.querySelector({1})],function(){{{2}}});",
            name,
            js_string(container.selector()),
            signal_statement(id)
        );
        self.bridge.eval(&code).map(drop).map_err(|e| {
            self.bridge.unregister(id);
            e.message().to_string()
        })
    }
}
