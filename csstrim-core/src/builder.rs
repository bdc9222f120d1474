//! Builder API that drives a pruning run.
//!
//! ```rust,ignore
//! use csstrim_core::prelude::*;
//!
//! let config = load_config(Path::new("csstrim.toml"))?;
//! let result = Csstrim::new(config)
//!     .base_dir(".")
//!     .dry_run(true)
//!     .run()?;
//!
//! for sheet in &result.sheets {
//!     println!("{}: {} selectors removed", sheet.path.display(), sheet.removed_selectors);
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache;
use crate::config::CsstrimConfig;
use crate::content::{scan_content, ScanOptions, UsageIndex};
use crate::error::{CsstrimError, CsstrimResult, IoResultExt};
use crate::logging::{log_error, log_sheet_summary};
use crate::output::{destination, write_stylesheet};
use crate::parse::{decode_stylesheet, parse_stylesheet};
use crate::resolve::{resolve, Lists};
use crate::rewrite::{rewrite, RewriteOptions};
use crate::safelist::{blocklist_rules, rules_from_config, Matcher};
use crate::scan::expand_globs;

/// Builder for one pruning run.
#[derive(Debug, Clone)]
pub struct Csstrim {
    config: CsstrimConfig,

    /// Directory relative globs and paths resolve against
    base_dir: PathBuf,

    /// Use the content token cache
    use_cache: bool,

    /// Compute everything, write nothing
    dry_run: bool,

    /// Keep removed selector texts in the report
    rejected: bool,

    /// Output directory, overriding the config
    output: Option<PathBuf>,
}

impl Csstrim {
    /// Create a run from a loaded configuration.
    pub fn new(config: CsstrimConfig) -> Self {
        Self {
            use_cache: config.cache,
            rejected: config.rejected,
            output: config.output.clone(),
            base_dir: PathBuf::from("."),
            dry_run: false,
            config,
        }
    }

    /// Directory the config's globs are relative to.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Enable or disable the content token cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Dry-run mode: report what would be removed without writing.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// List removed selectors in each sheet report.
    pub fn rejected(mut self, enabled: bool) -> Self {
        self.rejected = enabled;
        self
    }

    /// Write pruned stylesheets into `dir` instead of the config's output.
    pub fn output_override(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    fn output_dir(&self) -> Option<PathBuf> {
        self.output.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                self.base_dir.join(dir)
            }
        })
    }

    /// Run the pipeline.
    ///
    /// Pattern, config and file access problems abort the run. Parse and
    /// write failures (including a sheet that is not UTF-8) only affect
    /// their own stylesheet and are collected in [`RunResult::errors`].
    pub fn run(&self) -> CsstrimResult<RunResult> {
        // 1. Compile patterns before touching any file
        let safelist = Matcher::compile(&rules_from_config(&self.config.safelist))?;
        let blocklist = Matcher::compile(&blocklist_rules(&self.config.blocklist))?;

        // 2. Discover files
        let content_files = expand_globs(&self.base_dir, "content", &self.config.content)?;
        let css_files = expand_globs(&self.base_dir, "css", &self.config.css)?;
        info!(
            content = content_files.len(),
            stylesheets = css_files.len(),
            "discovered files"
        );

        // 3. Build the usage index; nothing is resolved until it is complete
        let index = self.scan(&content_files)?;

        // 4. Read every stylesheet up front; decoding happens per sheet
        let sheets = css_files
            .into_iter()
            .map(|path| {
                let bytes = fs::read(&path).with_path(&path)?;
                Ok((path, bytes))
            })
            .collect::<CsstrimResult<Vec<_>>>()?;

        // 5. Prune each stylesheet independently
        let lists = Lists {
            safelist: &safelist,
            blocklist: &blocklist,
        };
        let output_dir = self.output_dir();
        check_distinct_outputs(&sheets, output_dir.as_deref())?;
        let outcomes: Vec<CsstrimResult<SheetReport>> = sheets
            .par_iter()
            .map(|(path, bytes)| self.process_sheet(path, bytes, &index, &lists, output_dir.as_deref()))
            .collect();

        let mut result = RunResult {
            dry_run: self.dry_run,
            ..RunResult::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(report) => {
                    log_sheet_summary(&report.path, report.kept_selectors, report.removed_selectors, self.dry_run);
                    result.sheets.push(report);
                }
                Err(e) => {
                    log_error(&e);
                    result.errors.push(e);
                }
            }
        }
        Ok(result)
    }

    fn scan(&self, files: &[PathBuf]) -> CsstrimResult<UsageIndex> {
        let options = match &self.config.markup_extensions {
            Some(exts) => ScanOptions {
                markup_extensions: exts.clone(),
            },
            None => ScanOptions::default(),
        };
        if self.use_cache {
            let cached = cache::load_cache(&self.base_dir);
            cache::incremental_scan(&self.base_dir, files, &options, cached)
        } else {
            scan_content(files, &options)
        }
    }

    fn process_sheet(
        &self,
        path: &Path,
        bytes: &[u8],
        index: &UsageIndex,
        lists: &Lists<'_>,
        output_dir: Option<&Path>,
    ) -> CsstrimResult<SheetReport> {
        let text = decode_stylesheet(path, bytes)?;
        let mut tree = parse_stylesheet(path, text)?;
        let verdicts = resolve(&tree, index, lists);
        let stats = rewrite(
            &mut tree,
            &verdicts,
            RewriteOptions {
                keyframes: self.config.keyframes,
                font_face: self.config.font_face,
            },
        );
        let pruned = tree.serialize();
        let dest = destination(path, output_dir);

        // unchanged in-place sheets are not rewritten
        let written = !self.dry_run && (dest != path || pruned != text);
        if written {
            write_stylesheet(&dest, &pruned)?;
            debug!(output = %dest.display(), bytes = pruned.len(), "wrote stylesheet");
        }

        Ok(SheetReport {
            path: path.to_path_buf(),
            output: dest,
            written,
            kept_selectors: stats.kept_selectors,
            removed_selectors: stats.removed_selectors.len(),
            removed_rules: stats.removed_rules,
            removed_blocks: stats.removed_blocks,
            bytes_before: text.len(),
            bytes_after: pruned.len(),
            rejected: if self.rejected {
                stats.removed_selectors
            } else {
                Vec::new()
            },
        })
    }
}

/// Two stylesheets may not share an output file.
fn check_distinct_outputs<T>(sheets: &[(PathBuf, T)], output_dir: Option<&Path>) -> CsstrimResult<()> {
    let Some(dir) = output_dir else {
        return Ok(());
    };
    let mut seen = HashMap::new();
    for (path, _) in sheets {
        if let Some(first) = seen.insert(destination(path, Some(dir)), path) {
            return Err(CsstrimError::config(
                dir,
                format!(
                    "{} and {} would both be written to the same output file",
                    first.display(),
                    path.display()
                ),
            ));
        }
    }
    Ok(())
}

/// Outcome for one stylesheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    /// Input stylesheet
    pub path: PathBuf,

    /// Where the pruned text goes (or would go in a dry run)
    pub output: PathBuf,

    /// Whether the output file was written
    pub written: bool,

    pub kept_selectors: usize,
    pub removed_selectors: usize,
    pub removed_rules: usize,
    pub removed_blocks: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,

    /// Removed selector texts, when requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

/// Result of a run: per-sheet reports plus the per-sheet errors.
#[derive(Debug, Default)]
pub struct RunResult {
    pub sheets: Vec<SheetReport>,
    pub errors: Vec<CsstrimError>,
    pub dry_run: bool,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Total selector alternatives removed across all sheets.
    pub fn removed_count(&self) -> usize {
        self.sheets.iter().map(|s| s.removed_selectors).sum()
    }
}
