//! Markup scanner.
//!
//! Walks markup documents (HTML, XML, FXML, template fragments) with the
//! html5ever tokenizer and records every tag name, class token, id and
//! attribute it can see. The tokenizer recovers from errors the way browsers
//! do, so a broken fragment never stops the rest of the document from being
//! scanned.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Tokens used by the word extractor. Mirrors the usual utility-class alphabet.
static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_/:-]+").expect("word pattern is valid"));

/// A single markup document with the label it was loaded under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    /// Where the document came from (a path, `stdin`, a test name)
    pub source: String,
    /// Raw document text
    pub content: String,
}

impl MarkupDocument {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// Ordered, immutable collection of markup documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupCorpus {
    documents: Vec<MarkupDocument>,
}

impl MarkupCorpus {
    pub fn new(documents: Vec<MarkupDocument>) -> Self {
        Self { documents }
    }

    /// Build a corpus from bare strings, labelling them by position
    pub fn from_strings<I, S>(contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = contents
            .into_iter()
            .enumerate()
            .map(|(i, content)| MarkupDocument::new(format!("document-{}", i), content))
            .collect();
        Self { documents }
    }

    pub fn documents(&self) -> &[MarkupDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<MarkupDocument> for MarkupCorpus {
    fn from_iter<T: IntoIterator<Item = MarkupDocument>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// How much of a document the scanner looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorMode {
    /// Tags and attributes only
    #[default]
    Structured,
    /// Tags and attributes, plus every word-like token in the text
    Words,
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerOptions {
    /// Attributes whose whitespace-separated values are class names
    pub class_attributes: Vec<String>,
    /// Attributes whose values are element ids
    pub id_attributes: Vec<String>,
    pub extractor: ExtractorMode,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            class_attributes: vec!["class".to_string(), "styleClass".to_string()],
            id_attributes: vec!["id".to_string(), "fx:id".to_string()],
            extractor: ExtractorMode::Structured,
        }
    }
}

impl ScannerOptions {
    fn is_class_attribute(&self, name: &str) -> bool {
        self.class_attributes.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    fn is_id_attribute(&self, name: &str) -> bool {
        self.id_attributes.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Everything the scanner observed across a corpus
///
/// Tag and attribute names are stored lower-cased; class names, ids and
/// attribute values are stored exactly as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTokens {
    tags: HashSet<String>,
    classes: HashSet<String>,
    ids: HashSet<String>,
    attributes: HashMap<String, HashSet<String>>,
    words: HashSet<String>,
}

impl ExtractedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tag(&mut self, tag: &str) {
        let tag = tag.to_ascii_lowercase();
        if let Some((_, local)) = tag.split_once(':') {
            if !local.is_empty() {
                self.tags.insert(local.to_string());
            }
        }
        self.tags.insert(tag);
    }

    pub fn insert_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    pub fn insert_id(&mut self, id: &str) {
        self.ids.insert(id.to_string());
    }

    /// Record an attribute; valueless attributes are stored with an empty value
    pub fn insert_attribute(&mut self, name: &str, value: Option<&str>) {
        self.attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .insert(value.unwrap_or_default().to_string());
    }

    pub fn insert_word(&mut self, word: &str) {
        self.words.insert(word.to_string());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_ascii_lowercase();
        self.tags.contains(&tag) || self.words.contains(&tag)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class) || self.words.contains(class)
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.ids.contains(id) || self.words.contains(id)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(&name.to_ascii_lowercase())
    }

    /// All values observed for an attribute
    pub fn attribute_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    /// Union another token set into this one
    pub fn merge(&mut self, other: ExtractedTokens) {
        self.tags.extend(other.tags);
        self.classes.extend(other.classes);
        self.ids.extend(other.ids);
        for (name, values) in other.attributes {
            self.attributes.entry(name).or_default().extend(values);
        }
        self.words.extend(other.words);
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.classes.is_empty()
            && self.ids.is_empty()
            && self.attributes.is_empty()
            && self.words.is_empty()
    }
}

/// Scan every document of a corpus in parallel and union the results
pub fn scan_corpus(corpus: &MarkupCorpus, options: &ScannerOptions) -> ExtractedTokens {
    corpus
        .documents()
        .par_iter()
        .map(|document| {
            let tokens = scan_document(&document.content, options);
            tracing::debug!(
                source = %document.source,
                tags = tokens.tag_count(),
                classes = tokens.class_count(),
                ids = tokens.id_count(),
                "scanned markup document"
            );
            tokens
        })
        .reduce(ExtractedTokens::default, |mut acc, tokens| {
            acc.merge(tokens);
            acc
        })
}

/// Scan a single markup document
pub fn scan_document(content: &str, options: &ScannerOptions) -> ExtractedTokens {
    let queue = BufferQueue::default();
    queue.push_back(StrTendril::from_slice(content));
    let tokenizer = Tokenizer::new(TagCollector::new(options), TokenizerOpts::default());
    let _ = tokenizer.feed(&queue);
    tokenizer.end();
    let mut tokens = tokenizer.sink.tokens.take();

    if options.extractor == ExtractorMode::Words {
        for word in WORD_PATTERN.find_iter(content) {
            let word = word.as_str();
            tokens.insert_word(word);
            if word.contains(':') || word.contains('/') {
                for part in word.split([':', '/']).filter(|p| !p.is_empty()) {
                    tokens.insert_word(part);
                }
            }
        }
    }

    tokens
}

/// Token sink recording start tags and their attributes
///
/// The tokenizer only emits tags it managed to close; a tag cut off by the end
/// of input is dropped. Comments, doctypes, processing instructions and end
/// tags contribute nothing.
struct TagCollector<'o> {
    options: &'o ScannerOptions,
    tokens: RefCell<ExtractedTokens>,
}

impl<'o> TagCollector<'o> {
    fn new(options: &'o ScannerOptions) -> Self {
        Self {
            options,
            tokens: RefCell::new(ExtractedTokens::default()),
        }
    }

    fn record(&self, tag: &Tag) {
        let mut tokens = self.tokens.borrow_mut();
        tokens.insert_tag(&tag.name);
        for attribute in &tag.attrs {
            let name: &str = &attribute.name.local;
            let value: &str = &attribute.value;
            tokens.insert_attribute(name, Some(value));
            if self.options.is_class_attribute(name) {
                // FXML lists style classes with commas
                for class in value
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|c| !c.is_empty())
                {
                    tokens.insert_class(class);
                }
            }
            if self.options.is_id_attribute(name) {
                let id = value.trim();
                if !id.is_empty() {
                    tokens.insert_id(id);
                }
            }
        }
    }
}

impl TokenSink for TagCollector<'_> {
    type Handle = ();

    fn process_token(&self, token: Token, line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) if tag.kind == TagKind::StartTag => {
                self.record(&tag);
                if tag.self_closing {
                    return TokenSinkResult::Continue;
                }
                // Element content that is text, not markup
                match &*tag.name {
                    "script" => TokenSinkResult::RawData(RawKind::ScriptData),
                    "style" | "xmp" | "iframe" | "noembed" | "noframes" => TokenSinkResult::RawData(RawKind::Rawtext),
                    "textarea" | "title" => TokenSinkResult::RawData(RawKind::Rcdata),
                    _ => TokenSinkResult::Continue,
                }
            }
            Token::ParseError(error) => {
                tracing::trace!(line = line_number, %error, "tolerating malformed markup");
                TokenSinkResult::Continue
            }
            _ => TokenSinkResult::Continue,
        }
    }
}
