//! Content scanning: extracts the tokens a stylesheet selector can refer to.
//!
//! Markup files go through the `html5ever` tokenizer, which never rejects
//! input, so unclosed tags, template syntax and comments are all tolerated.
//! Other files (scripts, templates in unknown formats) go through a word
//! extractor so that class names built in script strings still count as used.
//!
//! Scanning is parallel and order independent: every file yields a
//! [`FileTokens`] set and the sets are unioned into one [`UsageIndex`].

use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CsstrimResult, IoResultExt};

/// Extensions tokenized as markup unless the config overrides them.
pub const DEFAULT_MARKUP_EXTENSIONS: &[&str] = &[
    "html", "htm", "xhtml", "svg", "xml", "vue", "php", "erb", "hbs", "njk", "liquid",
];

/// Kind of an extracted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    Tag,
    Class,
    Id,
    AttributeName,
    AttributeValue,
}

/// Tokens extracted from a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTokens {
    pub tags: BTreeSet<String>,
    pub classes: BTreeSet<String>,
    pub ids: BTreeSet<String>,
    pub attribute_names: BTreeSet<String>,
    pub attribute_values: BTreeSet<String>,
}

impl FileTokens {
    pub fn insert(&mut self, kind: TokenKind, token: &str) {
        if token.is_empty() {
            return;
        }
        let set = match kind {
            TokenKind::Tag => &mut self.tags,
            TokenKind::Class => &mut self.classes,
            TokenKind::Id => &mut self.ids,
            TokenKind::AttributeName => &mut self.attribute_names,
            TokenKind::AttributeValue => &mut self.attribute_values,
        };
        if !set.contains(token) {
            set.insert(token.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.classes.is_empty()
            && self.ids.is_empty()
            && self.attribute_names.is_empty()
            && self.attribute_values.is_empty()
    }

    fn record_word(&mut self, word: &str) {
        self.insert(TokenKind::Class, word);
        self.insert(TokenKind::Id, word);
        self.insert(TokenKind::Tag, &word.to_ascii_lowercase());
        self.insert(TokenKind::AttributeName, &word.to_ascii_lowercase());
        self.insert(TokenKind::AttributeValue, word);
    }
}

/// Union of all tokens found in the scanned content. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    tags: HashSet<String>,
    classes: HashSet<String>,
    ids: HashSet<String>,
    attribute_names: HashSet<String>,
    attribute_values: HashSet<String>,
}

impl UsageIndex {
    /// Union per-file token sets into the final index.
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a FileTokens>) -> Self {
        let mut index = UsageIndex::default();
        for tokens in files {
            index.tags.extend(tokens.tags.iter().cloned());
            index.classes.extend(tokens.classes.iter().cloned());
            index.ids.extend(tokens.ids.iter().cloned());
            index.attribute_names.extend(tokens.attribute_names.iter().cloned());
            index.attribute_values.extend(tokens.attribute_values.iter().cloned());
        }
        index
    }

    fn set(&self, kind: TokenKind) -> &HashSet<String> {
        match kind {
            TokenKind::Tag => &self.tags,
            TokenKind::Class => &self.classes,
            TokenKind::Id => &self.ids,
            TokenKind::AttributeName => &self.attribute_names,
            TokenKind::AttributeValue => &self.attribute_values,
        }
    }

    pub fn contains(&self, kind: TokenKind, token: &str) -> bool {
        self.set(kind).contains(token)
    }

    /// Every literal attribute value seen, for operator-based attribute selectors.
    pub fn attribute_values(&self) -> impl Iterator<Item = &str> {
        self.attribute_values.iter().map(String::as_str)
    }

    pub fn len(&self, kind: TokenKind) -> usize {
        self.set(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.classes.is_empty()
            && self.ids.is_empty()
            && self.attribute_names.is_empty()
            && self.attribute_values.is_empty()
    }
}

/// Which extractor a content file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extractor {
    Markup,
    Words,
}

/// Options for content scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub markup_extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            markup_extensions: DEFAULT_MARKUP_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScanOptions {
    pub fn extractor_for(&self, path: &Path) -> Extractor {
        let is_markup = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.markup_extensions
                    .iter()
                    .any(|m| m.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });
        if is_markup {
            Extractor::Markup
        } else {
            Extractor::Words
        }
    }
}

/// Elements whose content is text rather than markup.
fn raw_text_kind(name: &str) -> Option<RawKind> {
    match name {
        "script" => Some(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
        "textarea" | "title" => Some(RawKind::Rcdata),
        _ => None,
    }
}

/// Collects tag, class, id and attribute tokens from the tokenizer stream.
/// Text inside `<script>` is fed through the word extractor.
#[derive(Default)]
struct TokenCollector {
    tokens: RefCell<FileTokens>,
    script_text: RefCell<Option<String>>,
}

impl TokenSink for TokenCollector {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => {
                let name: &str = &tag.name;
                match tag.kind {
                    TagKind::StartTag => {
                        let name = name.to_ascii_lowercase();
                        let mut tokens = self.tokens.borrow_mut();
                        tokens.insert(TokenKind::Tag, &name);
                        for attr in &tag.attrs {
                            let attr_name: &str = &attr.name.local;
                            let value: &str = &attr.value;
                            tokens.insert(TokenKind::AttributeName, &attr_name.to_ascii_lowercase());
                            tokens.insert(TokenKind::AttributeValue, value);
                            if attr_name.eq_ignore_ascii_case("class") {
                                for class in value.split_whitespace() {
                                    tokens.insert(TokenKind::Class, class);
                                }
                            } else if attr_name.eq_ignore_ascii_case("id") {
                                tokens.insert(TokenKind::Id, value.trim());
                            }
                        }
                        if tag.self_closing {
                            return TokenSinkResult::Continue;
                        }
                        if name == "script" {
                            *self.script_text.borrow_mut() = Some(String::new());
                        }
                        // The bare tokenizer has no tree builder to switch
                        // states for it, so `a<b` in a script would start a tag.
                        if let Some(kind) = raw_text_kind(&name) {
                            return TokenSinkResult::RawData(kind);
                        }
                    }
                    TagKind::EndTag => {
                        if name.eq_ignore_ascii_case("script") {
                            if let Some(text) = self.script_text.borrow_mut().take() {
                                extract_words_into(&text, &mut self.tokens.borrow_mut());
                            }
                        }
                    }
                }
            }
            Token::CharacterTokens(text) => {
                if let Some(buf) = self.script_text.borrow_mut().as_mut() {
                    buf.push_str(&text);
                }
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }

    fn end(&self) {
        if let Some(text) = self.script_text.borrow_mut().take() {
            extract_words_into(&text, &mut self.tokens.borrow_mut());
        }
    }
}

/// Extract tokens from markup text.
pub fn extract_markup(text: &str) -> FileTokens {
    let queue = BufferQueue::default();
    queue.push_back(StrTendril::from_slice(text));

    let tokenizer = Tokenizer::new(TokenCollector::default(), TokenizerOpts::default());
    let _ = tokenizer.feed(&queue);
    tokenizer.end();

    tokenizer.sink.tokens.take()
}

fn word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // SAFETY: hardcoded pattern
    REGEX.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_\-:/.\[\]#%@]+").expect("Hardcoded regex pattern is valid")
    })
}

fn simple_word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]+").expect("Hardcoded regex pattern is valid"))
}

fn extract_words_into(text: &str, tokens: &mut FileTokens) {
    for m in word_regex().find_iter(text) {
        let run = m.as_str().trim_end_matches(['.', ':']);
        tokens.record_word(run);
        if run.len() > 1 {
            for word in simple_word_regex().find_iter(run) {
                tokens.record_word(word.as_str());
            }
        }
    }
}

/// Extract candidate tokens from non-markup text: every identifier-like run
/// counts as a possible tag, class, id or attribute.
pub fn extract_words(text: &str) -> FileTokens {
    let mut tokens = FileTokens::default();
    extract_words_into(text, &mut tokens);
    tokens
}

/// Run the given extractor over already-loaded text.
pub fn extract(extractor: Extractor, text: &str) -> FileTokens {
    match extractor {
        Extractor::Markup => extract_markup(text),
        Extractor::Words => extract_words(text),
    }
}

/// Read a content file. Invalid UTF-8 is replaced rather than rejected.
pub fn read_content(path: &Path) -> CsstrimResult<String> {
    let bytes = fs::read(path).with_path(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Scan one file into its token set.
pub fn scan_file(path: &Path, options: &ScanOptions) -> CsstrimResult<FileTokens> {
    let text = read_content(path)?;
    let extractor = options.extractor_for(path);
    let tokens = extract(extractor, &text);
    debug!(
        file = %path.display(),
        ?extractor,
        classes = tokens.classes.len(),
        "scanned content file"
    );
    Ok(tokens)
}

/// Scan all files in parallel. Any unreadable file fails the scan: a partial
/// index would make used selectors look unused.
pub fn scan_content(files: &[PathBuf], options: &ScanOptions) -> CsstrimResult<UsageIndex> {
    let per_file = files
        .par_iter()
        .map(|file| scan_file(file, options))
        .collect::<CsstrimResult<Vec<_>>>()?;
    Ok(UsageIndex::from_files(&per_file))
}
