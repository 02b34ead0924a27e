//! MathJax Loader
//!
//! Lazily injects the MathJax typesetting library into an HTML document and
//! asks it to render the math found inside a DOM subtree.
//!
//! # Features
//!
//! - **Load once**: the library script is attached at most once, even when
//!   several callers ask for it while it is still loading
//! - **Configure once**: the hub configuration is applied exactly once, on the
//!   script's load signal, before any typeset job is queued
//! - **Host adapters**: an in-memory page for tests and a script bridge
//!   (`bridge` feature, default) that drives a live page through JavaScript
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mathjax_loader::memory::MemoryPage;
//! use mathjax_loader::{ElementHandle, LoaderConfig, MathRenderer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let page = Arc::new(MemoryPage::with_library());
//! let renderer = MathRenderer::new(LoaderConfig::default(), page.clone());
//!
//! renderer.process_math(&*page, &ElementHandle::new("#preview"), None)?;
//! assert_eq!(page.hub().unwrap().pending_jobs(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Operation, Result};

pub mod config;
pub use config::{HubConfig, LoaderConfig, SvgConfig, Tex2JaxConfig, TexConfig};

// Host-facing traits (document, global scope, hub)
pub mod dom;
pub use dom::{Callback, Document, ElementHandle, GlobalScope, MathJaxHub, ScriptElement};

pub mod renderer;
pub use renderer::{LoadStatus, MathRenderer};

// Deterministic in-memory host
pub mod memory;

// Live-page adapter over JavaScript evaluation
#[cfg(feature = "bridge")]
pub mod bridge;

#[cfg(feature = "bridge")]
pub use bridge::{ScriptBridge, ScriptEngine, ScriptResult};
