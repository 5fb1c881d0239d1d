//! Selector lists and selector decomposition.
//!
//! Two jobs live here: splitting a comma separated selector list without
//! breaking up commas nested inside `(...)`, `[...]` or strings, and breaking a
//! single selector into compound and simple selectors for the reachability
//! check. Both run on the `cssparser` tokenizer, so escapes, strings and
//! comments follow CSS Syntax Level 3.

use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, ToCss, Token};
use thiserror::Error;

/// Why a selector could not be decomposed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unbalanced brackets or unterminated string")]
    Unbalanced,

    #[error("unexpected token '{0}'")]
    Unexpected(String),

    #[error("expected a name after '{0}'")]
    ExpectedName(char),

    #[error("combinator without a selector on its right")]
    DanglingCombinator,
}

/// A selector list split into its members
///
/// `separators[i]` is the exact text between `selectors[i]` and
/// `selectors[i + 1]` (comma plus surrounding whitespace), so joining them back
/// reproduces the original list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<String>,
    pub separators: Vec<String>,
    /// Whitespace after the last selector
    pub trailing: String,
}

impl SelectorList {
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// Combinator between two compound selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    SubsequentSibling,
}

/// Attribute selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    /// `[attr]`
    Exists,
    /// `[attr=val]`
    Equals,
    /// `[attr~=val]`
    Includes,
    /// `[attr|=val]`
    DashMatch,
    /// `[attr^=val]`
    Prefix,
    /// `[attr$=val]`
    Suffix,
    /// `[attr*=val]`
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    pub operator: AttributeOperator,
    pub value: Option<String>,
    /// Set by the `i` flag
    pub case_insensitive: bool,
}

/// A single simple selector component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// `*`
    Universal,
    /// Type selector, namespace prefix removed
    Type(String),
    Class(String),
    Id(String),
    Attribute(AttributeSelector),
    /// `:name` or `:name(argument)`
    PseudoClass { name: String, argument: Option<String> },
    /// `::name` or `::name(argument)`
    PseudoElement { name: String, argument: Option<String> },
    /// `&`
    Nesting,
}

/// Simple selectors with no combinator between them, e.g. `div.box#main`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub simples: Vec<SimpleSelector>,
}

/// A chain of compound selectors, left to right
///
/// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`. A leading
/// combinator of a relative selector (`> img` inside `:has()`) is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexSelector {
    pub compounds: Vec<CompoundSelector>,
    pub combinators: Vec<Combinator>,
}

impl ComplexSelector {
    pub fn simples(&self) -> impl Iterator<Item = &SimpleSelector> {
        self.compounds.iter().flat_map(|c| c.simples.iter())
    }
}

/// Split a selector list on top-level commas.
///
/// Commas inside parentheses, brackets, strings and comments do not split.
/// A list that is empty or whitespace-only yields an empty [`SelectorList`];
/// an empty member (`.a,,.b`) or unbalanced brackets are errors.
pub fn split_selector_list(input: &str) -> Result<SelectorList, SelectorError> {
    if input.trim_matches(is_css_whitespace).is_empty() {
        return Ok(SelectorList {
            trailing: input.to_string(),
            ..SelectorList::default()
        });
    }

    let mut members: Vec<(usize, usize)> = Vec::new();
    let mut parser_input = ParserInput::new(input);
    let mut parser = Parser::new(&mut parser_input);
    let mut member_start = 0;

    loop {
        let before = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comma => {
                members.push((member_start, before.byte_index()));
                member_start = parser.position().byte_index();
            }
            Token::Comment(_) => {
                if !is_closed_comment(parser.slice_from(before)) {
                    return Err(SelectorError::Unbalanced);
                }
            }
            Token::QuotedString(_) => {
                if !is_closed_string(parser.slice_from(before)) {
                    return Err(SelectorError::Unbalanced);
                }
            }
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                if !skip_block(&mut parser) {
                    return Err(SelectorError::Unbalanced);
                }
            }
            Token::BadString(_)
            | Token::BadUrl(_)
            | Token::CloseParenthesis
            | Token::CloseSquareBracket
            | Token::CloseCurlyBracket => return Err(SelectorError::Unbalanced),
            _ => {}
        }
    }
    members.push((member_start, input.len()));

    // Trim each member and keep the exact text between trimmed members
    let mut list = SelectorList::default();
    let mut previous_end = 0;
    for (index, &(start, end)) in members.iter().enumerate() {
        let raw = &input[start..end];
        let trimmed = raw.trim_matches(is_css_whitespace);
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let trimmed_start = start + (raw.len() - raw.trim_start_matches(is_css_whitespace).len());
        let trimmed_end = trimmed_start + trimmed.len();
        if index > 0 {
            list.separators.push(input[previous_end..trimmed_start].to_string());
        }
        list.selectors.push(trimmed.to_string());
        previous_end = trimmed_end;
    }
    list.trailing = input[previous_end..].to_string();
    Ok(list)
}

/// Decompose one selector (no top-level commas) into compound selectors.
///
/// Comments are dropped without standing in for whitespace, so `.a/**/.b` is
/// one compound.
pub fn parse_selector(input: &str) -> Result<ComplexSelector, SelectorError> {
    let mut parser_input = ParserInput::new(input);
    let mut parser = Parser::new(&mut parser_input);
    parse_complex(&mut parser)
}

/// Run `parse` over the block whose opening token was just returned.
///
/// The flag is false when the input ended before the closing token. An
/// `Err(None)` means the tokenizer itself gave up.
pub(crate) fn parse_block<'i, T, E: 'i>(
    parser: &mut Parser<'i, '_>,
    parse: impl for<'tt> FnOnce(&mut Parser<'i, 'tt>) -> Result<T, E>,
) -> Result<(T, bool), Option<E>> {
    let mut end = None;
    let value = parser
        .parse_nested_block(|nested| {
            let value = match parse(nested) {
                Ok(value) => value,
                Err(err) => {
                    return Err(ParseError {
                        kind: ParseErrorKind::Custom(err),
                        location: nested.current_source_location(),
                    })
                }
            };
            while nested.next_including_whitespace_and_comments().is_ok() {}
            end = Some(nested.position());
            Ok(value)
        })
        .map_err(|err| match err.kind {
            ParseErrorKind::Custom(err) => Some(err),
            ParseErrorKind::Basic(_) => None,
        })?;
    // cssparser closes blocks at end of input silently; a real closing token
    // moves the outer parser past where the contents ended
    let closed = end.is_some_and(|end: cssparser::SourcePosition| parser.position().byte_index() > end.byte_index());
    Ok((value, closed))
}

/// Skip the block whose opening token was just returned. False when unclosed.
pub(crate) fn skip_block(parser: &mut Parser<'_, '_>) -> bool {
    matches!(parse_block(parser, |_| Ok::<_, ()>(())), Ok(((), true)))
}

fn is_closed_comment(text: &str) -> bool {
    text.len() >= 4 && text.ends_with("*/")
}

fn is_closed_string(text: &str) -> bool {
    text.len() >= 2 && text.ends_with(&text[..1])
}

fn unexpected(token: &Token<'_>) -> SelectorError {
    SelectorError::Unexpected(token.to_css_string())
}

/// Next token, whitespace included and comments skipped
fn next_token<'i>(parser: &mut Parser<'i, '_>) -> Option<Token<'i>> {
    parser.next_including_whitespace().ok().cloned()
}

fn peek_token<'i>(parser: &mut Parser<'i, '_>) -> Option<Token<'i>> {
    let state = parser.state();
    let token = next_token(parser);
    parser.reset(&state);
    token
}

fn skip_whitespace(parser: &mut Parser<'_, '_>) -> bool {
    let mut skipped = false;
    while let Some(Token::WhiteSpace(_)) = peek_token(parser) {
        next_token(parser);
        skipped = true;
    }
    skipped
}

fn parse_complex(parser: &mut Parser<'_, '_>) -> Result<ComplexSelector, SelectorError> {
    let mut selector = ComplexSelector::default();
    let mut pending: Option<Combinator> = None;

    loop {
        let had_whitespace = skip_whitespace(parser);
        let Some(token) = peek_token(parser) else { break };

        let explicit = match token {
            Token::Delim('>') => Some(Combinator::Child),
            Token::Delim('+') => Some(Combinator::NextSibling),
            Token::Delim('~') => Some(Combinator::SubsequentSibling),
            _ => None,
        };
        if let Some(combinator) = explicit {
            if pending.is_some() {
                return Err(unexpected(&token));
            }
            next_token(parser);
            pending = Some(combinator);
            continue;
        }

        let compound = parse_compound(parser)?;
        if !selector.compounds.is_empty() {
            let combinator = match pending {
                Some(c) => c,
                None if had_whitespace => Combinator::Descendant,
                None => return Err(unexpected(&token)),
            };
            selector.combinators.push(combinator);
        }
        selector.compounds.push(compound);
        pending = None;
    }

    if selector.compounds.is_empty() {
        return Err(SelectorError::Empty);
    }
    if pending.is_some() {
        return Err(SelectorError::DanglingCombinator);
    }
    Ok(selector)
}

fn parse_compound(parser: &mut Parser<'_, '_>) -> Result<CompoundSelector, SelectorError> {
    let mut compound = CompoundSelector::default();

    while let Some(token) = peek_token(parser) {
        if matches!(token, Token::WhiteSpace(_) | Token::Comma | Token::Delim('>' | '+' | '~')) {
            break;
        }
        next_token(parser);
        let simple = match token {
            Token::Ident(_) | Token::Delim('*' | '|') => parse_type_or_universal(parser, &token)?,
            Token::Delim('.') => match next_token(parser) {
                Some(Token::Ident(name)) => SimpleSelector::Class(name.to_string()),
                _ => return Err(SelectorError::ExpectedName('.')),
            },
            Token::IDHash(name) | Token::Hash(name) => SimpleSelector::Id(name.to_string()),
            Token::SquareBracketBlock => parse_attribute(parser)?,
            Token::Colon => parse_pseudo(parser)?,
            Token::Delim('&') => SimpleSelector::Nesting,
            other => return Err(unexpected(&other)),
        };
        compound.simples.push(simple);
    }

    if compound.simples.is_empty() {
        return Err(peek_token(parser).map_or(SelectorError::Empty, |token| unexpected(&token)));
    }
    Ok(compound)
}

/// `div`, `*`, `svg|rect`, `*|*`, `|p`
fn parse_type_or_universal(parser: &mut Parser<'_, '_>, first: &Token<'_>) -> Result<SimpleSelector, SelectorError> {
    let mut name = type_name(first);
    let namespaced = match first {
        Token::Delim('|') => true,
        _ => peek_token(parser) == Some(Token::Delim('|')),
    };
    if namespaced {
        if name.is_some() {
            next_token(parser);
        }
        name = next_token(parser).as_ref().and_then(type_name);
    }
    match name {
        Some(name) if name == "*" => Ok(SimpleSelector::Universal),
        Some(name) => Ok(SimpleSelector::Type(name)),
        None => Err(SelectorError::ExpectedName('|')),
    }
}

fn type_name(token: &Token<'_>) -> Option<String> {
    match token {
        Token::Ident(name) => Some(name.to_string()),
        Token::Delim('*') => Some("*".to_string()),
        _ => None,
    }
}

fn parse_attribute(parser: &mut Parser<'_, '_>) -> Result<SimpleSelector, SelectorError> {
    match parse_block(parser, parse_attribute_body) {
        Ok((attribute, true)) => Ok(SimpleSelector::Attribute(attribute)),
        Ok((_, false)) | Err(None) => Err(SelectorError::Unbalanced),
        Err(Some(err)) => Err(err),
    }
}

/// Contents of `[...]`: `name`, `ns|name`, `name op value flag`
fn parse_attribute_body(parser: &mut Parser<'_, '_>) -> Result<AttributeSelector, SelectorError> {
    let mut name = match parser.next().ok().cloned() {
        Some(Token::Ident(name)) => Some(name.to_string()),
        Some(Token::Delim('*')) => {
            if next_token(parser) != Some(Token::Delim('|')) {
                return Err(SelectorError::ExpectedName('['));
            }
            None
        }
        Some(Token::Delim('|')) => None,
        _ => return Err(SelectorError::ExpectedName('[')),
    };
    if name.is_some() && peek_token(parser) == Some(Token::Delim('|')) {
        next_token(parser);
        name = None;
    }
    let name = match name {
        Some(name) => name,
        None => match next_token(parser) {
            Some(Token::Ident(name)) => name.to_string(),
            _ => return Err(SelectorError::ExpectedName('|')),
        },
    };

    let operator = match parser.next().ok().cloned() {
        None => {
            return Ok(AttributeSelector {
                name,
                operator: AttributeOperator::Exists,
                value: None,
                case_insensitive: false,
            })
        }
        Some(Token::Delim('=')) => AttributeOperator::Equals,
        Some(Token::IncludeMatch) => AttributeOperator::Includes,
        Some(Token::DashMatch) => AttributeOperator::DashMatch,
        Some(Token::PrefixMatch) => AttributeOperator::Prefix,
        Some(Token::SuffixMatch) => AttributeOperator::Suffix,
        Some(Token::SubstringMatch) => AttributeOperator::Substring,
        Some(other) => return Err(unexpected(&other)),
    };

    let value = match parser.next().ok().cloned() {
        Some(Token::Ident(value)) | Some(Token::QuotedString(value)) => value.to_string(),
        Some(number @ (Token::Number { .. } | Token::Dimension { .. })) => number.to_css_string(),
        Some(other) => return Err(unexpected(&other)),
        None => return Err(SelectorError::Unbalanced),
    };

    let mut case_insensitive = false;
    match parser.next().ok().cloned() {
        None => {}
        Some(Token::Ident(flag)) if flag.eq_ignore_ascii_case("i") => case_insensitive = true,
        Some(Token::Ident(flag)) if flag.eq_ignore_ascii_case("s") => {}
        Some(other) => return Err(unexpected(&other)),
    }
    if let Ok(token) = parser.next() {
        return Err(unexpected(token));
    }

    Ok(AttributeSelector {
        name,
        operator,
        value: Some(value),
        case_insensitive,
    })
}

fn parse_pseudo(parser: &mut Parser<'_, '_>) -> Result<SimpleSelector, SelectorError> {
    let element = peek_token(parser) == Some(Token::Colon);
    if element {
        next_token(parser);
    }
    let (name, argument) = match next_token(parser) {
        Some(Token::Ident(name)) => (name.to_string(), None),
        Some(Token::Function(name)) => {
            let name = name.to_string();
            let argument = parse_block(parser, |nested| {
                let start = nested.position();
                while nested.next_including_whitespace_and_comments().is_ok() {}
                Ok::<_, SelectorError>(nested.slice_from(start).trim_matches(is_css_whitespace).to_string())
            });
            match argument {
                Ok((argument, true)) => (name, Some(argument)),
                _ => return Err(SelectorError::Unbalanced),
            }
        }
        _ => return Err(SelectorError::ExpectedName(':')),
    };
    Ok(if element {
        SimpleSelector::PseudoElement { name, argument }
    } else {
        SimpleSelector::PseudoClass { name, argument }
    })
}

fn is_css_whitespace(ch: char) -> bool {
    ch.is_ascii_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_nesting() {
        let list = split_selector_list(":not(.a, .b), [data-x=\"1,2\"], .c").unwrap();
        assert_eq!(list.selectors, vec![":not(.a, .b)", "[data-x=\"1,2\"]", ".c"]);
        assert_eq!(list.separators, vec![", ", ", "]);
        assert_eq!(list.trailing, "");
    }

    #[test]
    fn test_split_keeps_separator_text() {
        let list = split_selector_list("h1,\n  h2 ,h3  ").unwrap();
        assert_eq!(list.selectors, vec!["h1", "h2", "h3"]);
        assert_eq!(list.separators, vec![",\n  ", " ,"]);
        assert_eq!(list.trailing, "  ");
    }

    #[test]
    fn test_split_empty_and_broken_lists() {
        assert!(split_selector_list("   ").unwrap().is_empty());
        assert_eq!(split_selector_list(".a,,.b"), Err(SelectorError::Empty));
        assert_eq!(split_selector_list(".a,"), Err(SelectorError::Empty));
        assert_eq!(split_selector_list(":is(.a"), Err(SelectorError::Unbalanced));
        assert_eq!(split_selector_list(".a)"), Err(SelectorError::Unbalanced));
    }

    #[test]
    fn test_split_ignores_comma_in_comment() {
        let list = split_selector_list(".a /* x, y */, .b").unwrap();
        assert_eq!(list.selectors, vec![".a /* x, y */", ".b"]);
    }

    #[test]
    fn test_parse_compound() {
        let selector = parse_selector("div.box#main[data-open]").unwrap();
        assert_eq!(selector.compounds.len(), 1);
        assert_eq!(
            selector.compounds[0].simples,
            vec![
                SimpleSelector::Type("div".to_string()),
                SimpleSelector::Class("box".to_string()),
                SimpleSelector::Id("main".to_string()),
                SimpleSelector::Attribute(AttributeSelector {
                    name: "data-open".to_string(),
                    operator: AttributeOperator::Exists,
                    value: None,
                    case_insensitive: false,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_combinators() {
        let selector = parse_selector("ul > li + li ~ .x .y").unwrap();
        assert_eq!(selector.compounds.len(), 5);
        assert_eq!(
            selector.combinators,
            vec![
                Combinator::Child,
                Combinator::NextSibling,
                Combinator::SubsequentSibling,
                Combinator::Descendant,
            ]
        );

        let tight = parse_selector("a>b").unwrap();
        assert_eq!(tight.combinators, vec![Combinator::Child]);
    }

    #[test]
    fn test_parse_pseudo() {
        let selector = parse_selector("a:hover::before").unwrap();
        let simples: Vec<_> = selector.simples().cloned().collect();
        assert_eq!(
            simples,
            vec![
                SimpleSelector::Type("a".to_string()),
                SimpleSelector::PseudoClass { name: "hover".to_string(), argument: None },
                SimpleSelector::PseudoElement { name: "before".to_string(), argument: None },
            ]
        );

        let functional = parse_selector("li:not(.a, .b):nth-child(2n + 1)").unwrap();
        let simples: Vec<_> = functional.simples().cloned().collect();
        assert_eq!(
            simples[1],
            SimpleSelector::PseudoClass { name: "not".to_string(), argument: Some(".a, .b".to_string()) }
        );
        assert_eq!(
            simples[2],
            SimpleSelector::PseudoClass { name: "nth-child".to_string(), argument: Some("2n + 1".to_string()) }
        );
    }

    #[test]
    fn test_parse_attribute_operators() {
        let selector = parse_selector(r#"a[href^='http'][lang|=en i][title*="a]b"]"#).unwrap();
        let simples: Vec<_> = selector.simples().cloned().collect();
        let SimpleSelector::Attribute(href) = &simples[1] else { panic!("expected attribute") };
        assert_eq!(href.operator, AttributeOperator::Prefix);
        assert_eq!(href.value.as_deref(), Some("http"));
        let SimpleSelector::Attribute(lang) = &simples[2] else { panic!("expected attribute") };
        assert_eq!(lang.operator, AttributeOperator::DashMatch);
        assert!(lang.case_insensitive);
        let SimpleSelector::Attribute(title) = &simples[3] else { panic!("expected attribute") };
        assert_eq!(title.value.as_deref(), Some("a]b"));
    }

    #[test]
    fn test_parse_escaped_class() {
        let selector = parse_selector(r".sm\:p-4.w-1\/2.\31 0").unwrap();
        assert_eq!(
            selector.compounds[0].simples,
            vec![
                SimpleSelector::Class("sm:p-4".to_string()),
                SimpleSelector::Class("w-1/2".to_string()),
                SimpleSelector::Class("10".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_namespaces_and_nesting() {
        let selector = parse_selector("svg|rect *|* & .x").unwrap();
        let simples: Vec<_> = selector.simples().cloned().collect();
        assert_eq!(
            simples,
            vec![
                SimpleSelector::Type("rect".to_string()),
                SimpleSelector::Universal,
                SimpleSelector::Nesting,
                SimpleSelector::Class("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_skips_comments() {
        let selector = parse_selector(".a/* note */.b").unwrap();
        assert_eq!(selector.compounds.len(), 1);
        assert_eq!(selector.compounds[0].simples.len(), 2);

        let spaced = parse_selector(".a /* note */ .b").unwrap();
        assert_eq!(spaced.combinators, vec![Combinator::Descendant]);
    }

    #[test]
    fn test_unterminated_comment_or_string_is_unbalanced() {
        assert_eq!(split_selector_list(".a /* open"), Err(SelectorError::Unbalanced));
        assert_eq!(split_selector_list("[title=\"open"), Err(SelectorError::Unbalanced));
        assert_eq!(split_selector_list(".a, ]"), Err(SelectorError::Unbalanced));
    }

    #[test]
    fn test_relative_selector() {
        let selector = parse_selector("> img").unwrap();
        assert_eq!(selector.compounds.len(), 1);
        assert!(selector.combinators.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_selector("").is_err());
        assert!(parse_selector(".").is_err());
        assert!(parse_selector("a >").is_err());
        assert!(parse_selector("a > > b").is_err());
        assert!(parse_selector("a[href").is_err());
        assert!(parse_selector("50%").is_err());
        assert!(parse_selector(":hover(").is_err());
    }
}
