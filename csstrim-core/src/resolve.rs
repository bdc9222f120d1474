//! Usage resolution: decides, per selector alternative, whether it stays.
//!
//! An alternative is removed only when every classified simple selector in it
//! (type, class, id, attribute) is absent from the [`UsageIndex`] and no
//! safelist rule protects it. Everything the resolver cannot classify is kept.

use std::collections::BTreeMap;

use crate::content::{TokenKind, UsageIndex};
use crate::safelist::{Matcher, Scope};
use crate::selector::{decompose, Decomposed, SimpleSelector};
use crate::tree::{NodeId, RuleTree};

/// Outcome for one selector alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Used,
    Protected,
    Unused,
}

impl Verdict {
    pub fn is_kept(self) -> bool {
        !matches!(self, Verdict::Unused)
    }
}

/// Address of an alternative: the style rule node and its position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlternativeId {
    pub node: NodeId,
    pub index: usize,
}

/// Verdicts of every alternative of every live style rule.
#[derive(Debug, Clone, Default)]
pub struct Verdicts {
    map: BTreeMap<AlternativeId, Verdict>,
}

impl Verdicts {
    pub fn get(&self, id: AlternativeId) -> Option<Verdict> {
        self.map.get(&id).copied()
    }

    pub fn insert(&mut self, id: AlternativeId, verdict: Verdict) {
        self.map.insert(id, verdict);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlternativeId, Verdict)> + '_ {
        self.map.iter().map(|(id, v)| (*id, *v))
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.map.values().filter(|&&v| v == verdict).count()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Name lists to check against the safelist and blocklist.
pub struct Lists<'a> {
    pub safelist: &'a Matcher,
    pub blocklist: &'a Matcher,
}

/// Compute a verdict for every alternative of every live style rule.
///
/// Keyframe selectors and opaque at-rules are not style rules and get no
/// verdict.
pub fn resolve(tree: &RuleTree, index: &UsageIndex, lists: &Lists<'_>) -> Verdicts {
    let mut verdicts = Verdicts::default();
    for node in tree.style_rules() {
        for (i, text) in tree.alternatives(node).into_iter().enumerate() {
            let verdict = resolve_alternative(text, index, lists);
            verdicts.insert(AlternativeId { node, index: i }, verdict);
        }
    }
    verdicts
}

/// Verdict for a single selector alternative.
pub fn resolve_alternative(alternative: &str, index: &UsageIndex, lists: &Lists<'_>) -> Verdict {
    let decomposed = decompose(alternative);
    let classified: Vec<&SimpleSelector> = decomposed
        .components
        .iter()
        .filter(|s| s.is_classified())
        .collect();

    if classified.is_empty() {
        return Verdict::Used;
    }

    let protected = is_protected(&decomposed, lists.safelist);
    let blocked = !lists.blocklist.is_empty()
        && classified
            .iter()
            .filter_map(|s| s.name())
            .any(|name| lists.blocklist.is_protected(name, Scope::Standard));

    let used = !blocked && classified.iter().any(|s| is_used(s, index));

    if used {
        Verdict::Used
    } else if protected {
        Verdict::Protected
    } else {
        Verdict::Unused
    }
}

fn is_used(selector: &SimpleSelector, index: &UsageIndex) -> bool {
    match selector {
        SimpleSelector::Type(tag) => index.contains(TokenKind::Tag, &tag.to_ascii_lowercase()),
        SimpleSelector::Class(name) => index.contains(TokenKind::Class, name),
        SimpleSelector::Id(name) => index.contains(TokenKind::Id, name),
        SimpleSelector::Attribute {
            name,
            op,
            value,
            case_insensitive,
        } => {
            if !index.contains(TokenKind::AttributeName, &name.to_ascii_lowercase()) {
                return false;
            }
            match (op, value) {
                (Some(op), Some(expected)) => index
                    .attribute_values()
                    .any(|actual| op.matches(actual, expected, *case_insensitive)),
                _ => true,
            }
        }
        _ => false,
    }
}

/// Standard rules see classified names, deep rules also see names nested in
/// pseudo-class arguments, greedy rules additionally see attribute values.
fn is_protected(decomposed: &Decomposed, safelist: &Matcher) -> bool {
    if safelist.is_empty() {
        return false;
    }

    let outer = decomposed.components.iter().filter(|s| s.is_classified());
    let nested = decomposed.nested.iter().filter(|s| s.is_classified());

    if safelist.has_scope(Scope::Standard)
        && outer
            .clone()
            .filter_map(|s| s.name())
            .any(|n| safelist.is_protected(n, Scope::Standard))
    {
        return true;
    }

    let everything = || outer.clone().chain(nested.clone());

    if safelist.has_scope(Scope::Deep)
        && everything()
            .filter_map(|s| s.name())
            .any(|n| safelist.is_protected(n, Scope::Deep))
    {
        return true;
    }

    if safelist.has_scope(Scope::Greedy) {
        for sel in everything() {
            if sel.name().is_some_and(|n| safelist.is_protected(n, Scope::Greedy)) {
                return true;
            }
            if let SimpleSelector::Attribute { value: Some(v), .. } = sel {
                if safelist.is_protected(v, Scope::Greedy) {
                    return true;
                }
            }
        }
    }

    false
}
