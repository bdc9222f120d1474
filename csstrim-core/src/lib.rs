//! csstrim-core: unused CSS removal driven by the markup that uses it
//!
//! This library scans generated markup and scripts for the tags, classes, ids
//! and attributes they use, parses stylesheets into an editable rule tree, and
//! deletes every selector alternative nothing refers to. Deletion is the only
//! edit: surviving bytes are written back exactly as they were.
//!
//! # Features
//!
//! - **Permissive markup scanning**: `html5ever` tokenizer, tolerant of
//!   templates and broken markup; inline scripts and non-markup files fall
//!   back to a word extractor
//! - **Safelists**: literal, prefix and regex rules in standard, deep and
//!   greedy scopes
//! - **Blocklist**: force names to count as unused
//! - **Container collapse**: `@media`/`@supports`/... blocks left empty go too
//! - **Optional `@keyframes` and `@font-face` pruning**
//! - **Incremental caching**: only re-tokenize changed content files
//! - **Atomic writes**: temp file + rename, originals intact on failure
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use csstrim_core::prelude::*;
//!
//! let config = load_config(Path::new("csstrim.toml"))?;
//! let result = Csstrim::new(config).base_dir(".").run()?;
//! print_plain(&result);
//! ```
//!
//! # Module Organization
//!
//! - [`safelist`]: rule compilation and scope-aware matching
//! - [`content`]: content tokenizing into a [`UsageIndex`]
//! - [`scan`]: glob expansion for content and stylesheet paths
//! - [`cache`]: content token cache with SHA-256 change detection
//! - [`parse`] / [`tree`]: stylesheet parser and the arena rule tree
//! - [`selector`]: selector list splitting and decomposition
//! - [`resolve`]: per-alternative verdicts
//! - [`rewrite`]: applies verdicts to the tree
//! - [`output`]: atomic persistence
//! - [`builder`]: fluent builder that runs the pipeline
//! - [`error`]: typed error handling

pub mod builder;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod output;
pub mod parse;
pub mod prelude;
pub mod report;
pub mod resolve;
pub mod rewrite;
pub mod safelist;
pub mod scan;
pub mod selector;
pub mod tree;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{CsstrimError, CsstrimResult, IoResultExt};

// Builder API
pub use builder::{Csstrim, RunResult, SheetReport};

// Cache types
pub use cache::{incremental_scan, load_cache, save_cache, CacheMetadata, CachedFile, TokenCache};

// Configuration
pub use config::{find_config, load_config, CsstrimConfig, RuleEntry, SafelistConfig, ScopedSafelist, CONFIG_FILE_NAME};

// Content scanning
pub use content::{
    extract, extract_markup, extract_words, scan_content, scan_file,
    Extractor, FileTokens, ScanOptions, TokenKind, UsageIndex,
};

// Logging
pub use logging::{init_structured_logging, log_empty_glob, log_error, log_sheet_summary};

// Output
pub use output::{destination, write_atomic, write_stylesheet};

// Parsing
pub use parse::{decode_stylesheet, parse_stylesheet};
pub use tree::{AtRule, NodeId, NodeKind, RuleTree, Span, StyleRule};

// Selectors
pub use selector::{decompose, AttrOp, Decomposed, SimpleSelector};

// Resolution and rewriting
pub use resolve::{resolve, resolve_alternative, AlternativeId, Lists, Verdict, Verdicts};
pub use rewrite::{rewrite, RewriteOptions, RewriteStats};

// Reporting
pub use report::{print_json, print_plain, render_plain, to_json};

// Safelist
pub use safelist::{blocklist_rules, rules_from_config, Matcher, RuleKind, SafelistRule, Scope};

// File discovery
pub use scan::{expand_glob, expand_globs};

#[cfg(test)]
mod tests;
