//! Selector reachability.
//!
//! A selector is reachable when every class, id, type and attribute it names
//! was observed somewhere in the markup. Combinators are ignored, so this is an
//! over-approximation of real matching: it may keep a selector no element
//! matches, but never drops one that could match.

use crate::markup::ExtractedTokens;
use crate::safelist::Safelist;
use crate::selector::{
    parse_selector, split_selector_list, AttributeOperator, AttributeSelector, ComplexSelector,
    SimpleSelector,
};

/// Functional pseudo-classes whose argument is a selector list that must
/// itself be reachable
const SELECTOR_PSEUDO_CLASSES: &[&str] = &[
    "is",
    "where",
    "matches",
    "-webkit-any",
    "-moz-any",
    "has",
    "host",
    "host-context",
];

const SELECTOR_PSEUDO_ELEMENTS: &[&str] = &["slotted"];

/// Reachability checks against one token set and safelist
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    tokens: &'a ExtractedTokens,
    safelist: &'a Safelist,
}

impl<'a> Matcher<'a> {
    pub fn new(tokens: &'a ExtractedTokens, safelist: &'a Safelist) -> Self {
        Self { tokens, safelist }
    }

    /// Check a single selector as written in a stylesheet.
    ///
    /// Selectors that cannot be decomposed are reported reachable.
    pub fn is_reachable(&self, selector: &str) -> bool {
        if self.safelist.matches_selector(selector) {
            return true;
        }
        match parse_selector(selector) {
            Ok(complex) => self.is_complex_reachable(&complex),
            Err(error) => {
                tracing::debug!(selector, %error, "keeping selector that could not be decomposed");
                true
            }
        }
    }

    /// Check an already decomposed selector
    pub fn is_complex_reachable(&self, selector: &ComplexSelector) -> bool {
        if selector
            .simples()
            .filter_map(simple_name)
            .any(|name| self.safelist.matches_greedy(name))
        {
            return true;
        }
        selector
            .compounds
            .iter()
            .all(|compound| compound.simples.iter().all(|simple| self.is_simple_reachable(simple)))
    }

    fn is_simple_reachable(&self, simple: &SimpleSelector) -> bool {
        match simple {
            SimpleSelector::Universal | SimpleSelector::Nesting => true,
            SimpleSelector::Type(name) => self.tokens.has_tag(name) || self.safelist.matches_name(name),
            SimpleSelector::Class(name) => self.tokens.has_class(name) || self.safelist.matches_name(name),
            SimpleSelector::Id(name) => self.tokens.has_id(name) || self.safelist.matches_name(name),
            SimpleSelector::Attribute(attribute) => self.is_attribute_reachable(attribute),
            SimpleSelector::PseudoClass { name, argument } => match argument {
                Some(argument) if SELECTOR_PSEUDO_CLASSES.contains(&name.to_ascii_lowercase().as_str()) => {
                    self.is_any_reachable(argument)
                }
                _ => true,
            },
            SimpleSelector::PseudoElement { name, argument } => match argument {
                Some(argument) if SELECTOR_PSEUDO_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) => {
                    self.is_any_reachable(argument)
                }
                _ => true,
            },
        }
    }

    /// True when at least one selector of a nested list is reachable
    fn is_any_reachable(&self, list: &str) -> bool {
        match split_selector_list(list) {
            Ok(list) if list.is_empty() => true,
            Ok(list) => list.selectors.iter().any(|selector| self.is_reachable(selector)),
            Err(_) => true,
        }
    }

    fn is_attribute_reachable(&self, attribute: &AttributeSelector) -> bool {
        if self.safelist.matches_name(&attribute.name) {
            return true;
        }
        if attribute.operator == AttributeOperator::Exists {
            return self.tokens.has_attribute(&attribute.name);
        }
        let expected = attribute.value.as_deref().unwrap_or_default();
        self.tokens
            .attribute_values(&attribute.name)
            .any(|observed| attribute_value_matches(attribute.operator, observed, expected, attribute.case_insensitive))
    }
}

/// Check one selector against a token set and safelist
pub fn is_reachable(selector: &str, tokens: &ExtractedTokens, safelist: &Safelist) -> bool {
    Matcher::new(tokens, safelist).is_reachable(selector)
}

fn simple_name(simple: &SimpleSelector) -> Option<&str> {
    match simple {
        SimpleSelector::Type(name) | SimpleSelector::Class(name) | SimpleSelector::Id(name) => Some(name.as_str()),
        SimpleSelector::Attribute(attribute) => Some(attribute.name.as_str()),
        _ => None,
    }
}

fn attribute_value_matches(operator: AttributeOperator, observed: &str, expected: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        return attribute_value_matches(operator, &observed.to_lowercase(), &expected.to_lowercase(), false);
    }
    match operator {
        AttributeOperator::Exists => true,
        AttributeOperator::Equals => observed == expected,
        AttributeOperator::Includes => {
            !expected.is_empty() && observed.split_whitespace().any(|word| word == expected)
        }
        AttributeOperator::DashMatch => {
            observed == expected
                || observed
                    .strip_prefix(expected)
                    .is_some_and(|rest| rest.starts_with('-'))
        }
        AttributeOperator::Prefix => !expected.is_empty() && observed.starts_with(expected),
        AttributeOperator::Suffix => !expected.is_empty() && observed.ends_with(expected),
        AttributeOperator::Substring => !expected.is_empty() && observed.contains(expected),
    }
}
