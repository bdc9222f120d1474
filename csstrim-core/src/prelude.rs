//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use csstrim_core::prelude::*;
//! ```
//!
//! Covers what a typical caller needs to load a config and run it, without
//! the parser and tree internals.

// Errors
pub use crate::error::{CsstrimError, CsstrimResult};

// Configuration
pub use crate::config::{find_config, load_config, CsstrimConfig};

// Builder API
pub use crate::builder::{Csstrim, RunResult, SheetReport};

// Matching and resolution
pub use crate::resolve::Verdict;
pub use crate::safelist::{Matcher, SafelistRule, Scope};

// Reporting
pub use crate::report::{print_json, print_plain};
