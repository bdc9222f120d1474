//! Decomposition of selector alternatives into simple selectors.
//!
//! Alternatives are re-tokenized with `cssparser`, which decodes escapes
//! (`md\:flex` -> `md:flex`) and hands bracketed arguments over as nested
//! blocks. This is permissive, not a validator: a token sequence it does not
//! recognize is skipped, which at worst leaves a selector unclassified (and
//! therefore kept).

use cssparser::{ParseError, Parser, ParserInput, Token};

/// Pseudo-classes whose argument is itself a selector list.
const SELECTOR_ARG_PSEUDOS: &[&str] = &[
    "not",
    "is",
    "where",
    "has",
    "matches",
    "any",
    "-moz-any",
    "-webkit-any",
    "host",
    "host-context",
    "slotted",
    "global",
    "local",
];

/// Attribute selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

impl AttrOp {
    fn from_token(token: &Token<'_>) -> Option<Self> {
        match token {
            Token::Delim('=') => Some(Self::Equals),
            Token::IncludeMatch => Some(Self::Includes),
            Token::DashMatch => Some(Self::DashMatch),
            Token::PrefixMatch => Some(Self::Prefix),
            Token::SuffixMatch => Some(Self::Suffix),
            Token::SubstringMatch => Some(Self::Substring),
            _ => None,
        }
    }

    /// Does an attribute whose value is `actual` satisfy `[attr op expected]`?
    pub fn matches(self, actual: &str, expected: &str, case_insensitive: bool) -> bool {
        let (actual, expected) = if case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual.to_string(), expected.to_string())
        };
        match self {
            Self::Equals => actual == expected,
            Self::Includes => actual.split_whitespace().any(|w| w == expected),
            Self::DashMatch => {
                actual == expected || actual.starts_with(&format!("{}-", expected))
            }
            Self::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            Self::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            Self::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

/// One simple selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// Lowercased element name.
    Type(String),
    Universal,
    /// Class name with CSS escapes decoded.
    Class(String),
    Id(String),
    Attribute {
        name: String,
        op: Option<AttrOp>,
        value: Option<String>,
        case_insensitive: bool,
    },
    PseudoClass {
        name: String,
        argument: Option<String>,
    },
    PseudoElement {
        name: String,
        argument: Option<String>,
    },
    /// `&`
    Nesting,
}

impl SimpleSelector {
    /// Whether this selector takes part in the used/unused decision.
    pub fn is_classified(&self) -> bool {
        matches!(
            self,
            Self::Type(_) | Self::Class(_) | Self::Id(_) | Self::Attribute { .. }
        )
    }

    /// The bare name a safelist rule is matched against.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Type(n) | Self::Class(n) | Self::Id(n) => Some(n),
            Self::Attribute { name, .. } => Some(name),
            Self::PseudoClass { name, .. } | Self::PseudoElement { name, .. } => Some(name),
            Self::Universal | Self::Nesting => None,
        }
    }
}

/// Simple selectors of one alternative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposed {
    /// Selectors outside any pseudo-class argument.
    pub components: Vec<SimpleSelector>,
    /// Selectors found inside `:not()`, `:is()`, `:where()`, `:has()` etc.
    pub nested: Vec<SimpleSelector>,
}

impl Decomposed {
    fn list(&mut self, in_argument: bool) -> &mut Vec<SimpleSelector> {
        if in_argument {
            &mut self.nested
        } else {
            &mut self.components
        }
    }
}

fn next_token<'i>(p: &mut Parser<'i, '_>) -> Option<Token<'i>> {
    p.next_including_whitespace_and_comments().ok().cloned()
}

/// Run `f` over the block whose opening token was just read.
fn nested<'i, T>(p: &mut Parser<'i, '_>, f: impl FnOnce(&mut Parser<'i, '_>) -> T) -> Option<T> {
    p.parse_nested_block(|inner| Ok::<_, ParseError<'i, ()>>(f(inner)))
        .ok()
}

/// Decompose one selector alternative.
pub fn decompose(alternative: &str) -> Decomposed {
    let mut input = ParserInput::new(alternative);
    let mut parser = Parser::new(&mut input);
    let mut out = Decomposed::default();
    decompose_into(&mut parser, &mut out, false);
    out
}

fn decompose_into(p: &mut Parser<'_, '_>, out: &mut Decomposed, in_argument: bool) {
    // previous token could be a namespace prefix (`svg|a`, `*|a`)
    let mut prefix = false;

    while let Some(token) = next_token(p) {
        let after_prefix = std::mem::take(&mut prefix);
        match token {
            Token::Delim('.') => {
                if let Some(Token::Ident(name)) = next_token(p) {
                    out.list(in_argument).push(SimpleSelector::Class(name.to_string()));
                }
            }
            Token::IDHash(name) | Token::Hash(name) => {
                out.list(in_argument).push(SimpleSelector::Id(name.to_string()));
            }
            Token::Ident(name) => {
                out.list(in_argument)
                    .push(SimpleSelector::Type(name.to_ascii_lowercase()));
                prefix = true;
            }
            Token::Delim('*') => {
                out.list(in_argument).push(SimpleSelector::Universal);
                prefix = true;
            }
            Token::Delim('|') if after_prefix => {
                out.list(in_argument).pop();
            }
            Token::Delim('&') => out.list(in_argument).push(SimpleSelector::Nesting),
            Token::SquareBracketBlock => {
                if let Some(attribute) = nested(p, parse_attribute) {
                    out.list(in_argument).push(attribute);
                }
            }
            Token::Colon => {
                if let Some(pseudo) = parse_pseudo(p, out) {
                    out.list(in_argument).push(pseudo);
                }
            }
            // combinators, whitespace, comments
            _ => {}
        }
    }
}

/// Parse what follows a `:`. Selectors inside the argument go to `out.nested`.
fn parse_pseudo(p: &mut Parser<'_, '_>, out: &mut Decomposed) -> Option<SimpleSelector> {
    let (element, token) = match next_token(p)? {
        Token::Colon => (true, next_token(p)?),
        other => (false, other),
    };
    let (name, argument) = match token {
        Token::Ident(name) => (name.to_ascii_lowercase(), None),
        Token::Function(name) => {
            let name = name.to_ascii_lowercase();
            let argument = nested(p, |inner| pseudo_argument(inner, &name, out));
            (name, argument)
        }
        _ => return None,
    };
    Some(if element {
        SimpleSelector::PseudoElement { name, argument }
    } else {
        SimpleSelector::PseudoClass { name, argument }
    })
}

/// Decompose a pseudo-class argument when it holds selectors, and return
/// its text.
fn pseudo_argument(p: &mut Parser<'_, '_>, name: &str, out: &mut Decomposed) -> String {
    let start = p.position();
    if SELECTOR_ARG_PSEUDOS.contains(&name) {
        decompose_into(p, out, true);
    } else {
        // :nth-child(2n+1 of .item)
        while let Some(token) = next_token(p) {
            if matches!(&token, Token::Ident(word) if word.eq_ignore_ascii_case("of")) {
                decompose_into(p, out, true);
            }
        }
    }
    p.slice_from(start).to_string()
}

/// Parse the inside of `[...]`.
fn parse_attribute(p: &mut Parser<'_, '_>) -> SimpleSelector {
    let mut name = String::new();
    let mut op = None;
    let mut value = None;
    let mut case_insensitive = false;

    loop {
        let start = p.position();
        let Some(token) = next_token(p) else {
            break;
        };
        match token {
            Token::WhiteSpace(_) | Token::Comment(_) => {}
            _ if value.is_some() => {
                if let Token::Ident(flag) = &token {
                    case_insensitive = flag.eq_ignore_ascii_case("i");
                }
            }
            _ if op.is_some() => {
                value = Some(match &token {
                    Token::Ident(v) | Token::QuotedString(v) => v.to_string(),
                    _ => p.slice_from(start).to_string(),
                });
            }
            Token::Ident(ident) => name = ident.to_ascii_lowercase(),
            // namespace prefix: `[xlink|href]`, `[*|lang]`
            Token::Delim('|') => name.clear(),
            other => op = AttrOp::from_token(&other),
        }
    }

    SimpleSelector::Attribute {
        name,
        op,
        value,
        case_insensitive,
    }
}
