//! Arena rule tree over the original stylesheet text.
//!
//! Nodes never own text; they record byte spans into [`RuleTree::source`].
//! Deleting a node only sets its tombstone flag, and [`RuleTree::serialize`]
//! skips tombstoned nodes while copying everything else verbatim. An
//! untouched tree therefore serializes to exactly its input.
//!
//! Every node's span starts with the whitespace preceding it, so the spans of
//! a container's children tile its block contents without gaps.

use std::ops::Range;

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Half-open byte range into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// A rule with a selector list and an opaque `{ ... }` body.
#[derive(Debug, Clone)]
pub struct StyleRule {
    /// Selector list, from its first character up to the `{`.
    pub prelude: Span,
    /// Each comma-separated alternative, whitespace trimmed.
    pub alternatives: Vec<Span>,
    /// `{` through `}` inclusive.
    pub body: Span,
    /// Indices into `alternatives` that survived pruning; `None` keeps all.
    pub kept: Option<Vec<usize>>,
}

impl StyleRule {
    pub fn kept_indices(&self) -> Vec<usize> {
        match &self.kept {
            Some(kept) => kept.clone(),
            None => (0..self.alternatives.len()).collect(),
        }
    }
}

/// Name and prelude of an at-rule.
#[derive(Debug, Clone)]
pub struct AtRule {
    /// Lowercased name without the `@`, vendor prefix kept.
    pub name: String,
    /// Text between the name and the `{` or `;`.
    pub prelude: Span,
}

impl AtRule {
    /// Name with any vendor prefix removed (`-webkit-keyframes` -> `keyframes`).
    pub fn base_name(&self) -> &str {
        strip_vendor_prefix(&self.name)
    }
}

pub fn strip_vendor_prefix(name: &str) -> &str {
    for prefix in ["-webkit-", "-moz-", "-ms-", "-o-"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest;
        }
    }
    name
}

/// Positions of a container's braces.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Offset of `{`.
    pub open: usize,
    /// End of the last child (start of the whitespace before `}`).
    pub inner_end: usize,
    /// Offset of `}`.
    pub close: usize,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Style(StyleRule),
    /// `@media`, `@supports`, `@container`, `@layer { }` and friends.
    Container(AtRule),
    Keyframes(AtRule),
    /// `from { }`, `50% { }` inside `@keyframes`.
    KeyframeBlock,
    /// Block at-rule whose body is not a rule list (`@font-face`, `@page`).
    OpaqueBlock(AtRule),
    /// `@import ...;`, `@charset ...;`
    Statement(AtRule),
    Comment,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Whole extent including leading whitespace.
    pub span: Span,
    /// Offset of the node's first significant character.
    pub start: usize,
    /// Set for containers and keyframes.
    pub block: Option<Block>,
    pub removed: bool,
}

/// Parsed stylesheet.
#[derive(Debug, Clone)]
pub struct RuleTree {
    pub source: String,
    pub nodes: Vec<Node>,
    pub roots: Vec<NodeId>,
    /// Offset where trailing whitespace after the last top-level node begins.
    pub tail_start: usize,
}

impl RuleTree {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn text(&self, span: Span) -> &str {
        &self.source[span.range()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tombstone a node. Its descendants disappear with it.
    pub fn remove(&mut self, id: NodeId) {
        self.nodes[id.0].removed = true;
    }

    /// Not tombstoned and no tombstoned ancestor.
    pub fn is_live(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur);
            if node.removed {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Node ids in document order (pre-order).
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        order
    }

    /// Live style rules in document order.
    pub fn style_rules(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|&id| matches!(self.node(id).kind, NodeKind::Style(_)) && self.is_live(id))
            .collect()
    }

    pub fn style_rule(&self, id: NodeId) -> Option<&StyleRule> {
        match &self.node(id).kind {
            NodeKind::Style(rule) => Some(rule),
            _ => None,
        }
    }

    /// Alternative texts of a style rule, in source order.
    pub fn alternatives(&self, id: NodeId) -> Vec<&str> {
        self.style_rule(id)
            .map(|rule| rule.alternatives.iter().map(|s| self.text(*s)).collect())
            .unwrap_or_default()
    }

    /// Live children that count as content (comments do not).
    pub fn live_rule_children(&self, id: NodeId) -> usize {
        self.node(id)
            .children
            .iter()
            .filter(|&&c| {
                let child = self.node(c);
                !child.removed && !matches!(child.kind, NodeKind::Comment)
            })
            .count()
    }

    /// Emit the tree, skipping tombstones and dropped alternatives.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for &id in &self.roots {
            self.emit(id, &mut out);
        }
        out.push_str(&self.source[self.tail_start..]);
        out
    }

    fn emit(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        if node.removed {
            return;
        }
        match (&node.kind, node.block) {
            (NodeKind::Style(rule), _) if rule.kept.is_some() => {
                out.push_str(&self.source[node.span.start..rule.prelude.start]);
                self.emit_selector_list(rule, out);
                out.push_str(&self.source[rule.prelude.end..node.span.end]);
            }
            (_, Some(block)) => {
                out.push_str(&self.source[node.span.start..=block.open]);
                for &child in &node.children {
                    self.emit(child, out);
                }
                out.push_str(&self.source[block.inner_end..node.span.end]);
            }
            _ => out.push_str(self.text(node.span)),
        }
    }

    /// Rebuild a selector list from its surviving alternatives, reusing the
    /// separator that followed each survivor in the source.
    fn emit_selector_list(&self, rule: &StyleRule, out: &mut String) {
        let alts = &rule.alternatives;
        let kept = rule.kept_indices();
        let (Some(first_alt), Some(last_alt)) = (alts.first(), alts.last()) else {
            return;
        };
        out.push_str(&self.source[rule.prelude.start..first_alt.start]);
        for (i, &k) in kept.iter().enumerate() {
            if i > 0 {
                let prev = kept[i - 1];
                out.push_str(&self.source[alts[prev].end..alts[prev + 1].start]);
            }
            out.push_str(self.text(alts[k]));
        }
        out.push_str(&self.source[last_alt.end..rule.prelude.end]);
    }
}
