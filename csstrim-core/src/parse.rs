//! Stylesheet parsing into a [`RuleTree`].
//!
//! Tokenizing is done by `cssparser`, so strings, comments, escapes and
//! bracket nesting are handled the way browsers handle them. On top of the
//! token stream this module only records structure (selector lists, blocks,
//! at-rules) as byte spans taken from token positions.
//!
//! Declaration bodies are walked as nested blocks, which validates them, but
//! they are never interpreted: their bytes are copied back untouched.

use std::path::Path;

use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, ParserState, SourceLocation, Token};

use crate::error::{CsstrimError, CsstrimResult};
use crate::tree::{strip_vendor_prefix, AtRule, Block, Node, NodeId, NodeKind, RuleTree, Span, StyleRule};

/// At-rules whose block contains rules.
const CONTAINER_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "container",
    "layer",
    "scope",
    "starting-style",
];

/// Error carried out of `cssparser`'s nested block callbacks.
type Failure<'i> = ParseError<'i, String>;

fn fail<'i>(location: SourceLocation, message: impl Into<String>) -> Failure<'i> {
    ParseError {
        kind: ParseErrorKind::Custom(message.into()),
        location,
    }
}

/// 1-based line and column.
fn line_column(location: SourceLocation) -> (usize, usize) {
    (location.line as usize + 1, location.column as usize)
}

fn to_error(path: &Path, err: Failure<'_>) -> CsstrimError {
    let (line, column) = line_column(err.location);
    let message = match err.kind {
        ParseErrorKind::Custom(message) => message,
        ParseErrorKind::Basic(_) => "invalid syntax".to_string(),
    };
    CsstrimError::parse_at(path, message, line, column)
}

/// Parse stylesheet text. `path` is only used for error locations.
pub fn parse_stylesheet(path: &Path, source: &str) -> CsstrimResult<RuleTree> {
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);
    let mut builder = TreeBuilder {
        source,
        nodes: Vec::new(),
    };
    let (roots, tail_start) = builder
        .parse_rule_list(&mut parser, None, BlockMode::Rules)
        .map_err(|e| to_error(path, e))?;
    Ok(RuleTree {
        source: source.to_string(),
        nodes: builder.nodes,
        roots,
        tail_start,
    })
}

/// Decode stylesheet bytes. Text that is not UTF-8 is a parse error located
/// at the first offending byte.
pub fn decode_stylesheet<'a>(path: &Path, bytes: &'a [u8]) -> CsstrimResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|err| {
        let valid = std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default();
        let (line, column) = line_column(end_location(valid));
        CsstrimError::parse_at(path, "stylesheet is not valid UTF-8", line, column)
    })
}

/// Location just past the end of `text`.
fn end_location(text: &str) -> SourceLocation {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    while parser.next_including_whitespace_and_comments().is_ok() {}
    parser.current_source_location()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockMode {
    Rules,
    Keyframes,
}

fn offset(p: &Parser<'_, '_>) -> usize {
    p.position().byte_index()
}

/// Next token, whitespace and comments included, with the state before it.
fn next_token<'i>(p: &mut Parser<'i, '_>) -> Option<(ParserState, Token<'i>)> {
    let state = p.state();
    let token = p.next_including_whitespace_and_comments().ok()?.clone();
    Some((state, token))
}

fn opens_block(token: &Token<'_>) -> bool {
    matches!(
        token,
        Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock
    )
}

fn string_is_closed(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes[bytes.len() - 1] != bytes[0] {
        return false;
    }
    let escapes = bytes[1..bytes.len() - 1]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    escapes % 2 == 0
}

/// The tokenizer recovers from strings cut by a newline or EOF and from
/// comments without `*/`; a stylesheet containing them is rejected.
fn check_token<'i>(p: &Parser<'i, '_>, state: &ParserState, token: &Token<'i>) -> Result<(), Failure<'i>> {
    let text = p.slice_from(state.position());
    let problem = match token {
        Token::BadString(_) => Some("unterminated string"),
        Token::QuotedString(_) if !string_is_closed(text) => Some("unterminated string"),
        Token::Comment(_) if text.len() < 4 || !text.ends_with("*/") => Some("unterminated comment"),
        _ => None,
    };
    match problem {
        Some(message) => Err(fail(state.source_location(), message)),
        None => Ok(()),
    }
}

/// Walk the rest of a block, nested blocks included.
fn scan_block<'i>(p: &mut Parser<'i, '_>) -> Result<(), Failure<'i>> {
    while let Some((state, token)) = next_token(p) {
        check_token(p, &state, &token)?;
        if let Token::CloseCurlyBracket = token {
            return Err(fail(state.source_location(), "unexpected `}`"));
        }
        if opens_block(&token) {
            p.parse_nested_block(|inner| scan_block(inner))?;
        }
    }
    Ok(())
}

/// Walk the block whose `{` was just read. Returns the offset after its `}`.
fn skip_body<'i>(p: &mut Parser<'i, '_>, open: &ParserState) -> Result<usize, Failure<'i>> {
    let inner_end = p.parse_nested_block(|inner| {
        scan_block(inner)?;
        Ok::<_, Failure<'i>>(offset(inner))
    })?;
    let after = offset(p);
    if after > inner_end {
        Ok(after)
    } else {
        Err(fail(open.source_location(), "unclosed block"))
    }
}

fn close_alternative<'i>(
    alternatives: &mut Vec<Span>,
    current: Option<Span>,
    origin: &ParserState,
) -> Result<(), Failure<'i>> {
    match current {
        Some(span) => {
            alternatives.push(span);
            Ok(())
        }
        None => Err(fail(origin.source_location(), "empty selector")),
    }
}

/// A rule prelude, scanned up to its terminator.
struct Prelude {
    /// State before the `{` or `;`
    terminator: ParserState,
    /// Whether the terminator is `{`
    block: bool,
    /// Offset of the terminator
    end: usize,
    /// End of the last significant token
    trimmed_end: usize,
    /// Comma separated alternatives, whitespace trimmed (selector lists only)
    alternatives: Vec<Span>,
}

struct TreeBuilder<'s> {
    source: &'s str,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>, span: Span, start: usize) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
            span,
            start,
            block: None,
            removed: false,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Parse rules until the tokens run out: EOF at the top level, the
    /// closing `}` inside a block. Returns the child ids and the offset
    /// where the trailing whitespace starts.
    fn parse_rule_list<'i>(
        &mut self,
        p: &mut Parser<'i, '_>,
        parent: Option<NodeId>,
        mode: BlockMode,
    ) -> Result<(Vec<NodeId>, usize), Failure<'i>> {
        let mut children = Vec::new();
        loop {
            let lead = offset(p);
            let (state, token) = loop {
                match next_token(p) {
                    Some((_, Token::WhiteSpace(_))) => continue,
                    Some(next) => break next,
                    None => return Ok((children, lead)),
                }
            };
            let start = state.position().byte_index();

            let id = match token {
                Token::Comment(_) => {
                    check_token(p, &state, &token)?;
                    self.push_node(NodeKind::Comment, parent, Span::new(lead, offset(p)), start)
                }
                Token::CloseCurlyBracket => {
                    return Err(fail(state.source_location(), "unexpected `}`"));
                }
                Token::Delim('@') => {
                    return Err(fail(state.source_location(), "expected at-rule name after `@`"));
                }
                Token::AtKeyword(ref name) => {
                    let name = name.to_ascii_lowercase();
                    self.parse_at_rule(p, parent, lead, &state, name)?
                }
                _ => self.parse_qualified_rule(p, parent, lead, state, token, mode)?,
            };
            children.push(id);
        }
    }

    /// Scan a prelude up to a top-level `{` (or `;` when `allow_semicolon`).
    /// `pending` is a first token that was already read.
    fn scan_prelude<'i>(
        &self,
        p: &mut Parser<'i, '_>,
        mut pending: Option<(ParserState, Token<'i>)>,
        start: &ParserState,
        allow_semicolon: bool,
        split: bool,
    ) -> Result<Prelude, Failure<'i>> {
        let start_offset = start.position().byte_index();
        let mut alternatives = Vec::new();
        let mut current: Option<Span> = None;
        let mut alt_origin = start.clone();
        let mut trimmed_end = start_offset;

        while let Some((state, token)) = pending.take().or_else(|| next_token(p)) {
            let at = state.position().byte_index();
            match token {
                Token::CurlyBracketBlock => {
                    if split {
                        close_alternative(&mut alternatives, current.take(), &alt_origin)?;
                    }
                    return Ok(Prelude {
                        terminator: state,
                        block: true,
                        end: at,
                        trimmed_end,
                        alternatives,
                    });
                }
                Token::Semicolon if allow_semicolon => {
                    return Ok(Prelude {
                        terminator: state,
                        block: false,
                        end: at,
                        trimmed_end,
                        alternatives,
                    });
                }
                Token::Semicolon | Token::CloseCurlyBracket => {
                    return Err(fail(
                        state.source_location(),
                        format!("expected `{{` after `{}`", self.source[start_offset..at].trim()),
                    ));
                }
                Token::Comma if split => {
                    close_alternative(&mut alternatives, current.take(), &alt_origin)?;
                    alt_origin = p.state();
                }
                Token::WhiteSpace(_) => {}
                _ => {
                    check_token(p, &state, &token)?;
                    if opens_block(&token) {
                        p.parse_nested_block(|inner| scan_block(inner))?;
                    }
                    let end = offset(p);
                    current = Some(Span::new(current.map_or(at, |s| s.start), end));
                    trimmed_end = end;
                }
            }
        }

        // Out of tokens: either EOF or the `}` closing the enclosing block.
        let at = offset(p);
        if self.source.as_bytes().get(at) == Some(&b'}') {
            return Err(fail(
                p.current_source_location(),
                format!("expected `{{` after `{}`", self.source[start_offset..at].trim()),
            ));
        }
        let expected = if allow_semicolon { "`;` or `{`" } else { "`{`" };
        Err(fail(
            start.source_location(),
            format!("unexpected end of input, expected {}", expected),
        ))
    }

    fn parse_qualified_rule<'i>(
        &mut self,
        p: &mut Parser<'i, '_>,
        parent: Option<NodeId>,
        lead: usize,
        state: ParserState,
        token: Token<'i>,
        mode: BlockMode,
    ) -> Result<NodeId, Failure<'i>> {
        let start = state.position().byte_index();
        let split = mode == BlockMode::Rules;
        let prelude = self.scan_prelude(p, Some((state.clone(), token)), &state, false, split)?;
        let after = skip_body(p, &prelude.terminator)?;

        let kind = match mode {
            BlockMode::Keyframes => NodeKind::KeyframeBlock,
            BlockMode::Rules => NodeKind::Style(StyleRule {
                prelude: Span::new(start, prelude.trimmed_end),
                alternatives: prelude.alternatives,
                body: Span::new(prelude.end, after),
                kept: None,
            }),
        };
        Ok(self.push_node(kind, parent, Span::new(lead, after), start))
    }

    fn parse_at_rule<'i>(
        &mut self,
        p: &mut Parser<'i, '_>,
        parent: Option<NodeId>,
        lead: usize,
        state: &ParserState,
        name: String,
    ) -> Result<NodeId, Failure<'i>> {
        let start = state.position().byte_index();
        let prelude_start = offset(p);
        let prelude = self.scan_prelude(p, None, state, true, false)?;
        let at_rule = AtRule {
            name,
            prelude: Span::new(prelude_start, prelude.end),
        };

        if !prelude.block {
            let span = Span::new(lead, offset(p));
            return Ok(self.push_node(NodeKind::Statement(at_rule), parent, span, start));
        }

        let base = strip_vendor_prefix(&at_rule.name);
        let mode = if base == "keyframes" {
            Some(BlockMode::Keyframes)
        } else if CONTAINER_AT_RULES.contains(&base) {
            Some(BlockMode::Rules)
        } else {
            None
        };

        let Some(mode) = mode else {
            let after = skip_body(p, &prelude.terminator)?;
            let span = Span::new(lead, after);
            return Ok(self.push_node(NodeKind::OpaqueBlock(at_rule), parent, span, start));
        };

        let kind = match mode {
            BlockMode::Keyframes => NodeKind::Keyframes(at_rule),
            BlockMode::Rules => NodeKind::Container(at_rule),
        };
        let open = prelude.end;
        let id = self.push_node(kind, parent, Span::new(lead, open), start);

        let ((children, inner_end), body_end) = p.parse_nested_block(|inner| {
            let list = self.parse_rule_list(inner, Some(id), mode)?;
            Ok::<_, Failure<'i>>((list, offset(inner)))
        })?;
        let after = offset(p);
        if after <= body_end {
            return Err(fail(prelude.terminator.source_location(), "unclosed block"));
        }

        let node = &mut self.nodes[id.0];
        node.children = children;
        node.span = Span::new(lead, after);
        node.block = Some(Block {
            open,
            inner_end,
            close: after - 1,
        });
        Ok(id)
    }
}
