//! Loader and MathJax hub configuration
//!
//! [`HubConfig`] is the record handed to `MathJax.Hub.Config` exactly once,
//! right after the library script finishes loading. It serializes with the
//! key names MathJax expects so script bridges can embed it verbatim.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Options passed to `MathJax.Hub.Config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    /// Input and output processors (TeX in, SVG out)
    pub jax: Vec<String>,
    /// Preprocessing extensions loaded by the hub
    pub extensions: Vec<String>,
    /// `"none"` suppresses on-page status messages
    pub message_style: String,
    /// Whether the built-in context menu is shown
    pub show_math_menu: bool,
    pub tex2jax: Tex2JaxConfig,
    #[serde(rename = "TeX")]
    pub tex: TexConfig,
    #[serde(rename = "SVG")]
    pub svg: SvgConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            jax: vec!["input/TeX".to_string(), "output/SVG".to_string()],
            extensions: vec!["tex2jax.js".to_string()],
            message_style: "none".to_string(),
            show_math_menu: false,
            tex2jax: Tex2JaxConfig::default(),
            tex: TexConfig::default(),
            svg: SvgConfig::default(),
        }
    }
}

/// Delimiter recognition for the tex2jax preprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tex2JaxConfig {
    /// Inline math delimiters as `(open, close)` pairs
    pub inline_math: Vec<(String, String)>,
    /// Display (block) math delimiters as `(open, close)` pairs
    pub display_math: Vec<(String, String)>,
    /// Allow `\$` to escape a delimiter
    pub process_escapes: bool,
    /// Treat raw `\begin{...}...\end{...}` blocks as math
    pub process_environments: bool,
    /// Placeholder shown before rendering; `"none"` disables it
    pub preview: String,
}

fn delimiters(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(open, close)| (open.to_string(), close.to_string()))
        .collect()
}

impl Default for Tex2JaxConfig {
    fn default() -> Self {
        Self {
            inline_math: delimiters(&[("$", "$"), ("\\(", "\\)")]),
            display_math: delimiters(&[("$$", "$$"), ("\\[", "\\]")]),
            process_escapes: true,
            process_environments: true,
            preview: "none".to_string(),
        }
    }
}

/// TeX input processor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TexConfig {
    pub extensions: Vec<String>,
}

impl Default for TexConfig {
    fn default() -> Self {
        Self {
            extensions: ["AMSmath.js", "AMSsymbols.js", "noErrors.js", "noUndefined.js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// SVG output processor options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvgConfig {
    pub font: String,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            font: "STIX-Web".to_string(),
        }
    }
}

/// Configuration for a [`MathRenderer`](crate::MathRenderer)
///
/// The script source is resolved relative to `module_dir`: the resource tree
/// lives next to it, under `<parent>/resources/<library_name>/<entry_file>`.
///
/// # Examples
///
/// ```
/// let cfg = mathjax_loader::LoaderConfig::default();
/// assert!(cfg.script_src().unwrap().ends_with("MathJax.js?delayStartupUntil=configured"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory the resource path is resolved against
    pub module_dir: PathBuf,
    /// Directory name of the library under `resources/`
    pub library_name: String,
    /// Entry script of the library
    pub entry_file: String,
    /// Query appended to the script source; holds startup until configured
    pub startup_query: String,
    /// `type` attribute of the injected script element
    pub script_type: String,
    /// Emit a `file://` URL instead of a plain path (requires an absolute `module_dir`)
    pub use_file_url: bool,
    /// Options applied once the library has loaded
    pub hub: HubConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/src")),
            library_name: "MathJax".to_string(),
            entry_file: "MathJax.js".to_string(),
            startup_query: "delayStartupUntil=configured".to_string(),
            script_type: "text/javascript".to_string(),
            use_file_url: false,
            hub: HubConfig::default(),
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem. `..` above the root
/// stays at the root; leading `..` of a relative path is kept.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl LoaderConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Filesystem location of the library entry script (without query):
    /// `<module_dir>/../resources/<library>/<entry>`, lexically normalized.
    pub fn resource_path(&self) -> PathBuf {
        normalize(
            &self
                .module_dir
                .join("..")
                .join("resources")
                .join(&self.library_name)
                .join(&self.entry_file),
        )
    }

    /// The `src` attribute for the injected script element
    pub fn script_src(&self) -> Result<String> {
        let path = self.resource_path();
        let query = Some(self.startup_query.as_str()).filter(|q| !q.is_empty());

        if self.use_file_url {
            let mut url = url::Url::from_file_path(&path).map_err(|_| {
                Error::ConfigError(format!(
                    "file URLs require an absolute module_dir, got {}",
                    path.display()
                ))
            })?;
            url.set_query(query);
            return Ok(url.to_string());
        }

        let mut src = path.to_string_lossy().into_owned();
        if let Some(q) = query {
            src.push('?');
            src.push_str(q);
        }
        Ok(src)
    }
}
