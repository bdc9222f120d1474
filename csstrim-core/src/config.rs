//! Configuration loading from csstrim.toml (or a JSON equivalent).
//!
//! ```toml
//! content = ["dist/**/*.html"]
//! css = ["dist/css/*.css"]
//! output = "dist/css"
//!
//! [safelist]
//! standard = ["/highlight/", "active"]
//! deep = [{ prefix = "col-" }]
//! greedy = ["/^data-/"]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CsstrimError, CsstrimResult};

/// Default configuration file name looked up in a directory.
pub const CONFIG_FILE_NAME: &str = "csstrim.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsstrimConfig {
    /// Glob patterns of markup/script files to scan for used tokens.
    pub content: Vec<String>,
    /// Glob patterns of stylesheets to prune.
    pub css: Vec<String>,
    /// Output directory. Stylesheets are rewritten in place when absent.
    pub output: Option<PathBuf>,
    /// Selectors protected from removal.
    pub safelist: SafelistConfig,
    /// Names treated as unused even when they appear in content.
    pub blocklist: Vec<RuleEntry>,
    /// Remove `@keyframes` no surviving rule animates with.
    pub keyframes: bool,
    /// Remove `@font-face` blocks no surviving rule refers to.
    pub font_face: bool,
    /// Report the removed selectors, not just their count.
    pub rejected: bool,
    /// Cache extracted content tokens between runs in `.csstrim/`. Opt-in.
    pub cache: bool,
    /// File extensions tokenized as markup. Everything else uses the word extractor.
    pub markup_extensions: Option<Vec<String>>,
}

impl Default for CsstrimConfig {
    fn default() -> Self {
        Self {
            content: Vec::new(),
            css: Vec::new(),
            output: None,
            safelist: SafelistConfig::default(),
            blocklist: Vec::new(),
            keyframes: false,
            font_face: false,
            rejected: false,
            cache: false,
            markup_extensions: None,
        }
    }
}

/// Safelist as written in the config: a bare list means standard scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SafelistConfig {
    Standard(Vec<RuleEntry>),
    Scoped(ScopedSafelist),
}

impl Default for SafelistConfig {
    fn default() -> Self {
        Self::Scoped(ScopedSafelist::default())
    }
}

impl SafelistConfig {
    /// Normalize to the scoped form.
    pub fn scoped(&self) -> ScopedSafelist {
        match self {
            Self::Standard(entries) => ScopedSafelist {
                standard: entries.clone(),
                ..ScopedSafelist::default()
            },
            Self::Scoped(scoped) => scoped.clone(),
        }
    }
}

/// Safelist entries per matching scope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopedSafelist {
    pub standard: Vec<RuleEntry>,
    pub deep: Vec<RuleEntry>,
    pub greedy: Vec<RuleEntry>,
}

/// One safelist/blocklist entry.
///
/// A plain string is a literal unless it is wrapped in slashes (`"/re/"`),
/// in which case it is a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Text(String),
    Literal { literal: String },
    Prefix { prefix: String },
    Pattern { pattern: String },
}

impl CsstrimConfig {
    /// Check the fields that have no usable default.
    pub fn validate(&self, path: &Path) -> CsstrimResult<()> {
        if self.content.is_empty() {
            return Err(CsstrimError::config(path, "`content` must list at least one glob"));
        }
        if self.css.is_empty() {
            return Err(CsstrimError::config(path, "`css` must list at least one glob"));
        }
        Ok(())
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str, path: &Path) -> CsstrimResult<Self> {
        toml::from_str(text).map_err(|e| CsstrimError::config(path, e.to_string()))
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str, path: &Path) -> CsstrimResult<Self> {
        serde_json::from_str(text).map_err(|e| CsstrimError::config(path, e.to_string()))
    }
}

/// Loads and validates a configuration file. `.json` files are read as JSON,
/// anything else as TOML.
pub fn load_config(path: &Path) -> CsstrimResult<CsstrimConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| CsstrimError::config(path, format!("cannot read config: {}", e)))?;

    let cfg = if path.extension().is_some_and(|ext| ext == "json") {
        CsstrimConfig::from_json(&text, path)?
    } else {
        CsstrimConfig::from_toml(&text, path)?
    };
    cfg.validate(path)?;
    Ok(cfg)
}

/// Returns `dir/csstrim.toml` if it exists.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}
