//! Output formatting - plaintext and JSON.

use serde_json::json;

use crate::builder::RunResult;

/// Renders a run as plain text.
pub fn render_plain(result: &RunResult) -> String {
    let mut out = String::new();
    if result.sheets.is_empty() && result.errors.is_empty() {
        out.push_str("No stylesheets matched.\n");
        return out;
    }

    let verb = if result.dry_run { "would remove" } else { "removed" };
    for sheet in &result.sheets {
        out.push_str(&format!(
            "{}: {} {} selector(s), kept {} ({} -> {} bytes)\n",
            sheet.path.display(),
            verb,
            sheet.removed_selectors,
            sheet.kept_selectors,
            sheet.bytes_before,
            sheet.bytes_after,
        ));
        for selector in &sheet.rejected {
            out.push_str(&format!("  - {}\n", selector));
        }
    }

    if !result.errors.is_empty() {
        out.push_str(&format!("ERRORS ({}):\n", result.errors.len()));
        for err in &result.errors {
            out.push_str(&format!("- [{}] {}\n", err.kind(), err));
        }
    }
    out
}

/// Prints a run in plain text format.
pub fn print_plain(result: &RunResult) {
    print!("{}", render_plain(result));
}

/// Builds the JSON document for a run.
pub fn to_json(result: &RunResult) -> serde_json::Value {
    let errors: Vec<_> = result
        .errors
        .iter()
        .map(|e| {
            json!({
                "kind": e.kind(),
                "path": e.path().map(|p| p.display().to_string()),
                "message": e.to_string(),
            })
        })
        .collect();

    json!({
        "dry_run": result.dry_run,
        "removed": result.removed_count(),
        "sheets": result.sheets,
        "errors": errors,
    })
}

/// Prints a run in JSON format.
///
/// Falls back to a minimal document if serialization fails.
pub fn print_json(result: &RunResult) {
    match serde_json::to_string_pretty(&to_json(result)) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            println!("{{\"removed\": {}}}", result.removed_count());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SheetReport;
    use crate::error::CsstrimError;
    use std::path::PathBuf;

    fn sample() -> RunResult {
        RunResult {
            sheets: vec![SheetReport {
                path: PathBuf::from("css/app.css"),
                output: PathBuf::from("css/app.css"),
                written: true,
                kept_selectors: 2,
                removed_selectors: 1,
                removed_rules: 1,
                removed_blocks: 0,
                bytes_before: 64,
                bytes_after: 44,
                rejected: vec![".unused-x".into()],
            }],
            errors: vec![CsstrimError::parse_at("css/broken.css", "unclosed block", 3, 7)],
            dry_run: false,
        }
    }

    #[test]
    fn test_render_plain() {
        let text = render_plain(&sample());
        assert!(text.contains("css/app.css: removed 1 selector(s), kept 2 (64 -> 44 bytes)"));
        assert!(text.contains("  - .unused-x"));
        assert!(text.contains("[ParseError]"));
        assert!(text.contains("3:7"));
    }

    #[test]
    fn test_render_plain_empty() {
        assert_eq!(render_plain(&RunResult::default()), "No stylesheets matched.\n");
    }

    #[test]
    fn test_json_shape() {
        let value = to_json(&sample());
        assert_eq!(value["removed"], 1);
        assert_eq!(value["sheets"][0]["rejected"][0], ".unused-x");
        assert_eq!(value["errors"][0]["kind"], "ParseError");
        assert_eq!(value["errors"][0]["path"], "css/broken.css");
    }
}
