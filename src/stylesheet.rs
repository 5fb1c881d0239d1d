//! Stylesheet model and parser.
//!
//! The parser is lossless: every byte of the input ends up in exactly one node
//! (or in a node's leading whitespace), so serializing an untouched
//! [`Stylesheet`] gives back the input unchanged. Only selector preludes are
//! looked into; declaration blocks are kept as opaque text.
//!
//! Tokens come from `cssparser`; node text is always sliced from the input
//! rather than re-serialized from tokens.

use crate::selector::{parse_block, parse_selector, skip_block, split_selector_list, SelectorError, SelectorList};
use cssparser::{Delimiter, ParseError, Parser as CssParser, ParserInput, ParserState, Token};
use serde::Serialize;

/// Conditional group rules whose bodies hold ordinary rules
const GROUP_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "-moz-document",
    "layer",
    "container",
    "scope",
    "starting-style",
];

/// Where a node starts in the original stylesheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    /// Byte offset
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
}

/// A parsed stylesheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
    /// Whitespace after the last node
    pub trailing: String,
}

impl Stylesheet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of style rules, including rules nested in group at-rules
    pub fn rule_count(&self) -> usize {
        fn count(nodes: &[Node]) -> usize {
            nodes
                .iter()
                .map(|node| match node {
                    Node::Rule(_) => 1,
                    Node::AtRule(AtRule { body: AtRuleBody::Nested { nodes, .. }, .. }) => count(nodes),
                    _ => 0,
                })
                .sum()
        }
        count(&self.nodes)
    }

    /// Every selector of every style rule, in source order
    pub fn selectors(&self) -> Vec<&str> {
        fn collect<'a>(nodes: &'a [Node], out: &mut Vec<&'a str>) {
            for node in nodes {
                match node {
                    Node::Rule(rule) => out.extend(rule.selectors.iter().map(String::as_str)),
                    Node::AtRule(AtRule { body: AtRuleBody::Nested { nodes, .. }, .. }) => collect(nodes, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.nodes, &mut out);
        out
    }
}

/// One top-level item of a stylesheet or of a group at-rule body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(StyleRule),
    AtRule(AtRule),
    Comment(Comment),
    /// Content that could not be parsed; always kept verbatim
    Opaque(Opaque),
}

impl Node {
    pub fn position(&self) -> SourcePosition {
        match self {
            Node::Rule(rule) => rule.position,
            Node::AtRule(at_rule) => at_rule.position,
            Node::Comment(comment) => comment.position,
            Node::Opaque(opaque) => opaque.position,
        }
    }
}

/// `selector, selector { declarations }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// Whitespace before the rule
    pub leading: String,
    /// Selectors exactly as written, without surrounding whitespace
    pub selectors: Vec<String>,
    /// Text between consecutive selectors
    pub separators: Vec<String>,
    /// Whitespace between the last selector and `{`
    pub prelude_trailing: String,
    /// The declaration block, braces included, verbatim
    pub block: String,
    pub position: SourcePosition,
}

impl StyleRule {
    /// Copy of this rule keeping only the selectors flagged in `keep`.
    ///
    /// When nothing is dropped the original separators are kept; otherwise the
    /// survivors are joined with the list's own separator if it used a single
    /// style, or `", "` if it mixed several.
    pub fn retain_selectors(&self, keep: &[bool]) -> StyleRule {
        let selectors: Vec<String> = self
            .selectors
            .iter()
            .zip(keep)
            .filter(|(_, &kept)| kept)
            .map(|(selector, _)| selector.clone())
            .collect();

        let separators = if selectors.len() == self.selectors.len() {
            self.separators.clone()
        } else {
            let separator = self.uniform_separator().unwrap_or(", ");
            vec![separator.to_string(); selectors.len().saturating_sub(1)]
        };

        StyleRule {
            selectors,
            separators,
            ..self.clone()
        }
    }

    fn uniform_separator(&self) -> Option<&str> {
        let first = self.separators.first()?;
        self.separators
            .iter()
            .all(|s| s == first)
            .then_some(first.as_str())
    }

    /// Declarations of the block, best effort
    pub fn declarations(&self) -> Vec<Declaration> {
        parse_declarations(&self.block)
    }
}

/// `@name prelude;`, `@name prelude { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    pub leading: String,
    /// Name without the `@`, as written
    pub name: String,
    /// Everything between the name and the `;` or `{`
    pub prelude: String,
    pub body: AtRuleBody,
    pub position: SourcePosition,
}

impl AtRule {
    /// Lower-cased name with any vendor prefix removed
    pub fn base_name(&self) -> String {
        let name = self.name.to_ascii_lowercase();
        for prefix in ["-webkit-", "-moz-", "-o-", "-ms-"] {
            if let Some(rest) = name.strip_prefix(prefix) {
                return rest.to_string();
            }
        }
        name
    }

    pub fn is_keyframes(&self) -> bool {
        self.base_name() == "keyframes"
    }

    pub fn is_font_face(&self) -> bool {
        self.base_name() == "font-face"
    }

    /// Unquoted prelude, e.g. the animation name of `@keyframes fade`
    pub fn prelude_name(&self) -> &str {
        self.prelude.trim().trim_matches(|c| c == '"' || c == '\'')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtRuleBody {
    /// Ends with `;`
    Statement,
    /// Block kept as text, braces included
    Block(String),
    /// Group rule body parsed into nodes; `trailing` is the whitespace before `}`
    Nested { nodes: Vec<Node>, trailing: String },
}

/// `/* ... */` between rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub leading: String,
    /// Full comment text, delimiters included
    pub text: String,
    pub position: SourcePosition,
}

impl Comment {
    /// Text between the delimiters, trimmed
    pub fn content(&self) -> &str {
        comment_content(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub leading: String,
    pub text: String,
    pub position: SourcePosition,
}

/// A `name: value` pair from a declaration block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lower-cased property name
    pub name: String,
    pub value: String,
}

/// Parse stylesheet text. Never fails; broken input becomes [`Node::Opaque`].
pub fn parse_stylesheet(input: &str) -> Stylesheet {
    let mut parser_input = ParserInput::new(input);
    let mut parser = CssParser::new(&mut parser_input);
    let (nodes, trailing) = parse_nodes(&mut parser);
    Stylesheet { nodes, trailing }
}

/// Split a declaration block into declarations.
///
/// Comments are dropped, nested blocks and anything without a `:` are skipped.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let inner = block.trim();
    let inner = inner.strip_prefix('{').unwrap_or(inner);
    let inner = inner.strip_suffix('}').unwrap_or(inner);

    let mut parser_input = ParserInput::new(inner);
    let mut parser = CssParser::new(&mut parser_input);
    let mut declarations = Vec::new();
    while !parser.is_exhausted() {
        if let Ok(Some(declaration)) = parser.parse_until_after(Delimiter::Semicolon, parse_declaration) {
            declarations.push(declaration);
        }
    }
    declarations
}

fn parse_declaration<'i>(parser: &mut CssParser<'i, '_>) -> Result<Option<Declaration>, ParseError<'i, ()>> {
    let name = parser.expect_ident()?.to_ascii_lowercase();
    parser.expect_colon()?;

    let mut value = String::new();
    let mut piece_start = parser.position();
    let mut nested_rule = false;
    loop {
        let before = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comment(_) => {
                value.push_str(parser.slice(piece_start..before));
                piece_start = parser.position();
            }
            Token::CurlyBracketBlock => {
                nested_rule = true;
                skip_block(parser);
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                skip_block(parser);
            }
            _ => {}
        }
    }
    value.push_str(parser.slice_from(piece_start));

    if nested_rule {
        return Ok(None);
    }
    Ok(Some(Declaration {
        name,
        value: value.trim().to_string(),
    }))
}

/// Contents of every `/* ... */` comment in `text`, trimmed
pub fn comments_in(text: &str) -> Vec<&str> {
    let mut parser_input = ParserInput::new(text);
    let mut parser = CssParser::new(&mut parser_input);
    let mut comments = Vec::new();
    collect_comments(&mut parser, &mut comments);
    comments
}

fn collect_comments<'i>(parser: &mut CssParser<'i, '_>, comments: &mut Vec<&'i str>) {
    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return,
        };
        match token {
            Token::Comment(content) => comments.push(content.trim()),
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                let _ = parse_block(parser, |nested| {
                    collect_comments(nested, comments);
                    Ok::<_, ()>(())
                });
            }
            _ => {}
        }
    }
}

fn comment_content(text: &str) -> &str {
    let inner = text.strip_prefix("/*").unwrap_or(text);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);
    inner.trim()
}

fn position_of(state: &ParserState) -> SourcePosition {
    SourcePosition {
        offset: state.position().byte_index(),
        line: state.source_location().line as usize + 1,
    }
}

/// Whitespace up to the next token, consumed
fn take_leading<'i>(parser: &mut CssParser<'i, '_>) -> &'i str {
    let start = parser.position();
    loop {
        let state = parser.state();
        match parser.next_including_whitespace_and_comments() {
            Ok(Token::WhiteSpace(_)) => {}
            _ => {
                parser.reset(&state);
                return parser.slice_from(start);
            }
        }
    }
}

/// Nodes up to the end of input, or up to the `}` closing the current block
fn parse_nodes(parser: &mut CssParser<'_, '_>) -> (Vec<Node>, String) {
    let mut nodes = Vec::new();
    loop {
        let leading = take_leading(parser).to_string();
        let start = parser.state();

        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => {
                parser.reset(&start);
                return (nodes, leading);
            }
        };

        let node = match token {
            Token::Comment(_) => {
                let text = parser.slice_from(start.position());
                if text.len() >= 4 && text.ends_with("*/") {
                    Node::Comment(Comment {
                        leading,
                        text: text.to_string(),
                        position: position_of(&start),
                    })
                } else {
                    opaque(parser, leading, &start, "unterminated comment")
                }
            }
            // Legacy HTML comment markers
            Token::CDO | Token::CDC => Node::Opaque(Opaque {
                leading,
                text: parser.slice_from(start.position()).to_string(),
                position: position_of(&start),
            }),
            Token::CloseCurlyBracket => opaque(parser, leading, &start, "unmatched closing brace"),
            Token::AtKeyword(_) => parse_at_rule(parser, leading, &start),
            _ => {
                parser.reset(&start);
                parse_qualified_rule(parser, leading, &start)
            }
        };
        nodes.push(node);
    }
}

fn parse_qualified_rule(parser: &mut CssParser<'_, '_>, leading: String, start: &ParserState) -> Node {
    loop {
        let before = parser.state();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return opaque(parser, leading, start, "rule without a block"),
        };
        match token {
            Token::CurlyBracketBlock => {
                let prelude = parser.slice(start.position()..before.position());
                if !skip_block(parser) {
                    return opaque(parser, leading, start, "unterminated declaration block");
                }
                return match split_rule_prelude(prelude) {
                    Ok(list) => Node::Rule(StyleRule {
                        leading,
                        selectors: list.selectors,
                        separators: list.separators,
                        prelude_trailing: list.trailing,
                        block: parser.slice_from(before.position()).to_string(),
                        position: position_of(start),
                    }),
                    Err(error) => opaque(parser, leading, start, &format!("invalid selector: {}", error)),
                };
            }
            Token::Semicolon => return opaque(parser, leading, start, "declaration outside of a block"),
            Token::CloseCurlyBracket => {
                parser.reset(&before);
                return opaque(parser, leading, start, "rule without a block");
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                skip_block(parser);
            }
            _ => {}
        }
    }
}

/// The `@name` token has been consumed
fn parse_at_rule(parser: &mut CssParser<'_, '_>, leading: String, start: &ParserState) -> Node {
    let name = &parser.slice_from(start.position())[1..];
    let prelude_start = parser.position();

    loop {
        let before = parser.state();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return opaque(parser, leading, start, "at-rule without a body"),
        };
        let body = match token {
            Token::Semicolon => AtRuleBody::Statement,
            Token::CurlyBracketBlock if GROUP_RULES.contains(&name.to_ascii_lowercase().as_str()) => {
                match parse_block(parser, |nested| Ok::<_, ()>(parse_nodes(nested))) {
                    Ok(((nodes, trailing), true)) => AtRuleBody::Nested { nodes, trailing },
                    _ => return opaque(parser, leading, start, "unterminated at-rule block"),
                }
            }
            Token::CurlyBracketBlock => {
                if !skip_block(parser) {
                    return opaque(parser, leading, start, "unterminated at-rule block");
                }
                AtRuleBody::Block(parser.slice_from(before.position()).to_string())
            }
            Token::CloseCurlyBracket => {
                parser.reset(&before);
                return opaque(parser, leading, start, "at-rule without a body");
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                skip_block(parser);
                continue;
            }
            _ => continue,
        };
        return Node::AtRule(AtRule {
            leading,
            name: name.to_string(),
            prelude: parser.slice(prelude_start..before.position()).to_string(),
            body,
            position: position_of(start),
        });
    }
}

/// Node holding everything from `start` to the current position verbatim
fn opaque(parser: &CssParser<'_, '_>, leading: String, start: &ParserState, reason: &str) -> Node {
    let position = position_of(start);
    tracing::warn!(line = position.line, reason, "keeping unparseable CSS verbatim");
    Node::Opaque(Opaque {
        leading,
        text: parser.slice_from(start.position()).to_string(),
        position,
    })
}

/// Split a rule prelude and check that every selector decomposes
fn split_rule_prelude(prelude: &str) -> Result<SelectorList, SelectorError> {
    let list = split_selector_list(prelude)?;
    for selector in &list.selectors {
        parse_selector(selector)?;
    }
    Ok(list)
}
