//! Applies verdicts to a [`RuleTree`].
//!
//! Only tombstones and kept-alternative lists are touched; declaration bodies
//! are never edited, so [`RuleTree::serialize`] keeps every surviving byte.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::resolve::{AlternativeId, Verdicts};
use crate::tree::{NodeId, NodeKind, RuleTree};

/// Optional at-rule removals.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    /// Drop `@keyframes` no surviving `animation` references.
    pub keyframes: bool,
    /// Drop `@font-face` blocks whose family no surviving rule uses.
    pub font_face: bool,
}

/// What a rewrite removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Text of every removed selector alternative, in document order.
    pub removed_selectors: Vec<String>,
    /// Style rules removed with their body.
    pub removed_rules: usize,
    /// Containers, `@keyframes` and `@font-face` blocks removed.
    pub removed_blocks: usize,
    /// Alternatives still present.
    pub kept_selectors: usize,
}

/// Remove unused alternatives, then rules left without any, then the blocks
/// that became empty or unreferenced.
pub fn rewrite(tree: &mut RuleTree, verdicts: &Verdicts, options: RewriteOptions) -> RewriteStats {
    let mut stats = RewriteStats::default();

    for id in tree.style_rules() {
        let alternatives: Vec<String> = tree.alternatives(id).into_iter().map(str::to_string).collect();
        let mut kept = Vec::with_capacity(alternatives.len());
        for (index, text) in alternatives.iter().enumerate() {
            let keep = verdicts
                .get(AlternativeId { node: id, index })
                .is_none_or(|v| v.is_kept());
            if keep {
                kept.push(index);
            } else {
                stats.removed_selectors.push(text.clone());
            }
        }

        stats.kept_selectors += kept.len();
        if kept.is_empty() {
            debug!(selector = %alternatives.join(", "), "removing rule");
            tree.remove(id);
            stats.removed_rules += 1;
        } else if kept.len() < alternatives.len() {
            if let NodeKind::Style(rule) = &mut tree.node_mut(id).kind {
                rule.kept = Some(kept);
            }
        }
    }

    stats.removed_blocks += collapse_empty_containers(tree);
    if options.keyframes {
        stats.removed_blocks += remove_unused_keyframes(tree);
    }
    if options.font_face {
        stats.removed_blocks += remove_unused_font_faces(tree);
    }
    stats
}

/// Tombstone containers whose rules were all removed. Containers that were
/// empty in the source are left alone.
fn collapse_empty_containers(tree: &mut RuleTree) -> usize {
    let mut removed = 0;
    // reverse pre-order visits children before parents
    for id in tree.walk().into_iter().rev() {
        let node = tree.node(id);
        if node.removed || !matches!(node.kind, NodeKind::Container(_)) {
            continue;
        }
        let had_rules = node
            .children
            .iter()
            .any(|&c| !matches!(tree.node(c).kind, NodeKind::Comment));
        if had_rules && tree.live_rule_children(id) == 0 {
            tree.remove(id);
            removed += 1;
        }
    }
    removed
}

fn animation_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // SAFETY: hardcoded pattern
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[;{\s])(?:-webkit-|-moz-|-o-)?animation(?:-name)?\s*:\s*([^;}]+)")
            .expect("Hardcoded regex pattern is valid")
    })
}

fn font_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[;{\s])font(?:-family)?\s*:\s*([^;}]+)")
            .expect("Hardcoded regex pattern is valid")
    })
}

fn font_family_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[;{\s])font-family\s*:\s*([^;}]+)")
            .expect("Hardcoded regex pattern is valid")
    })
}

/// Declaration bodies of every live style rule.
fn live_bodies(tree: &RuleTree) -> Vec<&str> {
    tree.style_rules()
        .into_iter()
        .filter_map(|id| tree.style_rule(id).map(|rule| tree.text(rule.body)))
        .collect()
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(s)
}

/// Remove `@keyframes` whose name no live `animation`/`animation-name` uses.
fn remove_unused_keyframes(tree: &mut RuleTree) -> usize {
    let mut referenced: HashSet<String> = HashSet::new();
    for body in live_bodies(tree) {
        for caps in animation_regex().captures_iter(body) {
            for part in caps[1].split([',', ' ', '\t', '\n', '\r']) {
                let name = unquote(part.trim_end_matches("!important"));
                if !name.is_empty() {
                    referenced.insert(name.to_string());
                }
            }
        }
    }

    let unused: Vec<NodeId> = tree
        .walk()
        .into_iter()
        .filter(|&id| tree.is_live(id))
        .filter(|&id| match &tree.node(id).kind {
            NodeKind::Keyframes(at) => !referenced.contains(unquote(tree.text(at.prelude))),
            _ => false,
        })
        .collect();

    for &id in &unused {
        debug!(keyframes = %tree.text(tree.node(id).span).trim(), "removing unused keyframes");
        tree.remove(id);
    }
    unused.len()
}

/// Every family name a `font`/`font-family` value could refer to, lowercased.
/// Unquoted pieces of the `font` shorthand contribute each trailing word run,
/// so `bold 12px Open Sans` yields `open sans`, `sans` and so on.
fn referenced_families(tree: &RuleTree) -> HashSet<String> {
    let mut families = HashSet::new();
    for body in live_bodies(tree) {
        for caps in font_regex().captures_iter(body) {
            for piece in caps[1].split(',') {
                let piece = piece.trim().trim_end_matches("!important").trim();
                if let Some(start) = piece.find(['"', '\'']) {
                    families.insert(unquote(&piece[start..]).to_lowercase());
                    continue;
                }
                let words: Vec<&str> = piece.split_whitespace().collect();
                for i in 0..words.len() {
                    families.insert(words[i..].join(" ").to_lowercase());
                }
            }
        }
    }
    families
}

/// Remove `@font-face` blocks whose family is never used by a live rule.
/// Blocks without a `font-family` descriptor are kept.
fn remove_unused_font_faces(tree: &mut RuleTree) -> usize {
    let families = referenced_families(tree);

    let unused: Vec<NodeId> = tree
        .walk()
        .into_iter()
        .filter(|&id| tree.is_live(id))
        .filter(|&id| {
            let node = tree.node(id);
            match &node.kind {
                NodeKind::OpaqueBlock(at) if at.base_name() == "font-face" => {
                    font_family_regex()
                        .captures(tree.text(node.span))
                        .map(|caps| unquote(&caps[1]).to_lowercase())
                        .is_some_and(|family| !families.contains(&family))
                }
                _ => false,
            }
        })
        .collect();

    for &id in &unused {
        tree.remove(id);
    }
    unused.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{extract_markup, UsageIndex};
    use crate::parse::parse_stylesheet;
    use crate::resolve::{resolve, Lists};
    use crate::safelist::{Matcher, SafelistRule, Scope};
    use std::path::Path;

    fn prune_with(css: &str, html: &str, rules: &[SafelistRule], options: RewriteOptions) -> (String, RewriteStats) {
        let mut tree = parse_stylesheet(Path::new("test.css"), css).unwrap();
        let tokens = extract_markup(html);
        let index = UsageIndex::from_files([&tokens]);
        let safelist = Matcher::compile(rules).unwrap();
        let blocklist = Matcher::default();
        let lists = Lists {
            safelist: &safelist,
            blocklist: &blocklist,
        };
        let verdicts = resolve(&tree, &index, &lists);
        let stats = rewrite(&mut tree, &verdicts, options);
        (tree.serialize(), stats)
    }

    fn prune(css: &str, html: &str) -> String {
        prune_with(css, html, &[], RewriteOptions::default()).0
    }

    #[test]
    fn test_removes_unused_rule() {
        let (out, stats) = prune_with(
            ".card{color:red}.unused-x{color:blue}.highlight{font-weight:bold}",
            r#"<div class="card highlight"></div>"#,
            &[],
            RewriteOptions::default(),
        );
        assert_eq!(out, ".card{color:red}.highlight{font-weight:bold}");
        assert_eq!(stats.removed_selectors, vec![".unused-x"]);
        assert_eq!(stats.removed_rules, 1);
        assert_eq!(stats.kept_selectors, 2);
    }

    #[test]
    fn test_partial_selector_list() {
        let html = r#"<a class="a c"></a>"#;
        assert_eq!(prune(".a, .b, .c { x: y }", html), ".a, .c { x: y }");
        assert_eq!(prune(".b,\n.a { x: y }", html), ".a { x: y }");
        assert_eq!(prune(".a ,.b{x:y}", html), ".a{x:y}");
    }

    #[test]
    fn test_empty_media_block_removed() {
        let css = "body { margin: 0 }\n@media (max-width: 600px) {\n  .gone { display: none }\n}\n";
        assert_eq!(prune(css, "<body></body>"), "body { margin: 0 }\n");
    }

    #[test]
    fn test_nested_containers_collapse() {
        let css = "@supports (display: grid) { @media print { .x { a: b } } /* note */ }\np{}";
        assert_eq!(prune(css, "<p>"), "\np{}");
    }

    #[test]
    fn test_source_empty_container_kept() {
        assert_eq!(prune("@media print {}", ""), "@media print {}");
    }

    #[test]
    fn test_comments_and_untouched_bytes_survive() {
        let css = "/* header */\n.a { color: red; /* inline */ }\n\n.b { color: blue }\n";
        assert_eq!(
            prune(css, r#"<i class="a">"#),
            "/* header */\n.a { color: red; /* inline */ }\n"
        );
    }

    #[test]
    fn test_idempotent() {
        let css = ".a, .b { x: y }\n@media print { .c { x: y } .a { z: w } }\n";
        let html = r#"<i class="a">"#;
        let once = prune(css, html);
        let twice = prune(&once, html);
        assert_eq!(once, twice);
        assert_eq!(once, ".a { x: y }\n@media print { .a { z: w } }\n");
    }

    #[test]
    fn test_greedy_attribute_protection() {
        let (out, _) = prune_with(
            "[data-toggle]{cursor:pointer}.x{}",
            "",
            &[SafelistRule::pattern("^data-", Scope::Greedy)],
            RewriteOptions::default(),
        );
        assert_eq!(out, "[data-toggle]{cursor:pointer}");
    }

    #[test]
    fn test_deep_prefix_protection() {
        let (out, _) = prune_with(
            ".col-md-6{width:50%}.other{}",
            "",
            &[SafelistRule::prefix("col-", Scope::Deep)],
            RewriteOptions::default(),
        );
        assert_eq!(out, ".col-md-6{width:50%}");
    }

    #[test]
    fn test_keyframes_kept_by_default() {
        let css = "@keyframes spin{from{}to{}}";
        assert_eq!(prune(css, ""), css);
    }

    #[test]
    fn test_unused_keyframes_removed() {
        let css = "@keyframes spin{to{}}\n@-webkit-keyframes fade{to{}}\n@keyframes gone{to{}}\n.a{animation:spin 1s linear}\n.b{-webkit-animation-name:fade}\n.c{animation:gone 1s}";
        let (out, stats) = prune_with(
            css,
            r#"<i class="a b">"#,
            &[],
            RewriteOptions {
                keyframes: true,
                font_face: false,
            },
        );
        assert_eq!(
            out,
            "@keyframes spin{to{}}\n@-webkit-keyframes fade{to{}}\n.a{animation:spin 1s linear}\n.b{-webkit-animation-name:fade}"
        );
        assert_eq!(stats.removed_blocks, 1);
    }

    #[test]
    fn test_unused_font_face_removed() {
        let css = "@font-face{font-family:\"Open Sans\";src:url(a.woff)}\n@font-face{font-family:Mono;src:url(b.woff)}\n@font-face{src:url(c.woff)}\n.a{font:bold 12px/1.2 Open Sans, sans-serif}\n.b{font-family:Mono}";
        let (out, _) = prune_with(
            css,
            r#"<i class="a">"#,
            &[],
            RewriteOptions {
                keyframes: false,
                font_face: true,
            },
        );
        assert_eq!(
            out,
            "@font-face{font-family:\"Open Sans\";src:url(a.woff)}\n@font-face{src:url(c.woff)}\n.a{font:bold 12px/1.2 Open Sans, sans-serif}"
        );
    }
}
