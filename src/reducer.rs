//! Rule filtering.
//!
//! Walks a parsed stylesheet and builds a new one holding only rules with at
//! least one reachable selector. Group at-rules are filtered recursively and
//! dropped once nothing but comments is left in them. Everything else passes
//! through untouched.

use crate::matcher::Matcher;
use crate::report::RemovedAtRule;
use crate::stylesheet::{comments_in, parse_declarations, AtRule, AtRuleBody, Node, StyleRule, Stylesheet};

/// Optional passes run after rule filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Remove `@keyframes` no kept rule animates with
    pub keyframes: bool,
    /// Remove `@font-face` blocks no kept rule uses
    pub font_face: bool,
}

/// Result of reducing one stylesheet
#[derive(Debug, Clone, Default)]
pub struct Reduction {
    pub stylesheet: Stylesheet,
    /// Removed selectors with the line of the rule they were removed from
    pub rejected: Vec<(String, usize)>,
    pub removed_at_rules: Vec<RemovedAtRule>,
    /// Number of selectors left in the output
    pub selectors_kept: usize,
}

/// Comment directives controlling what the reducer may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    StartIgnore,
    EndIgnore,
    IgnoreNext,
    IgnoreCurrent,
}

impl Directive {
    fn parse(content: &str) -> Option<Directive> {
        let words: Vec<&str> = content.trim_start_matches('!').split_whitespace().collect();
        match words.as_slice() {
            ["purgecss", "start", "ignore"] => Some(Directive::StartIgnore),
            ["purgecss", "end", "ignore"] => Some(Directive::EndIgnore),
            ["purgecss", "ignore"] => Some(Directive::IgnoreNext),
            ["purgecss", "ignore", "current"] => Some(Directive::IgnoreCurrent),
            _ => None,
        }
    }
}

/// Tracks ignore regions and one-shot ignores while walking nodes
#[derive(Debug, Default)]
struct DirectiveState {
    ignoring: bool,
    ignore_next: bool,
}

impl DirectiveState {
    /// Update state from a comment node. Returns true when `node` is a comment.
    fn observe(&mut self, node: &Node) -> bool {
        let Node::Comment(comment) = node else {
            return false;
        };
        match Directive::parse(comment.content()) {
            Some(Directive::StartIgnore) => self.ignoring = true,
            Some(Directive::EndIgnore) => self.ignoring = false,
            Some(Directive::IgnoreNext) => self.ignore_next = true,
            _ => {}
        }
        true
    }

    /// Is the next non-comment node protected? Consumes a one-shot ignore.
    fn protects_next(&mut self) -> bool {
        let next = std::mem::take(&mut self.ignore_next);
        self.ignoring || next
    }
}

/// Filter a stylesheet down to its reachable rules
pub fn reduce(stylesheet: &Stylesheet, matcher: &Matcher<'_>, options: &ReduceOptions) -> Reduction {
    let mut reducer = Reducer {
        matcher,
        directives: DirectiveState::default(),
        rejected: Vec::new(),
        removed_at_rules: Vec::new(),
    };
    let mut nodes = reducer.reduce_nodes(&stylesheet.nodes);

    if options.keyframes || options.font_face {
        let usage = Usage::collect(&nodes);
        reducer.directives = DirectiveState::default();
        nodes = reducer.remove_unused_at_rules(nodes, &usage, options);
    }

    let stylesheet = Stylesheet {
        nodes,
        trailing: stylesheet.trailing.clone(),
    };
    let selectors_kept = stylesheet.selectors().len();

    Reduction {
        stylesheet,
        rejected: reducer.rejected,
        removed_at_rules: reducer.removed_at_rules,
        selectors_kept,
    }
}

struct Reducer<'m, 'a> {
    matcher: &'m Matcher<'a>,
    directives: DirectiveState,
    rejected: Vec<(String, usize)>,
    removed_at_rules: Vec<RemovedAtRule>,
}

impl Reducer<'_, '_> {
    /// Directives only reach the end of the block they are written in
    fn in_block<T>(&mut self, walk: impl FnOnce(&mut Self) -> T) -> T {
        let outer = std::mem::take(&mut self.directives);
        let result = walk(self);
        self.directives = outer;
        result
    }

    fn reduce_nodes(&mut self, nodes: &[Node]) -> Vec<Node> {
        let mut kept = Vec::with_capacity(nodes.len());

        for node in nodes {
            if self.directives.observe(node) || self.directives.protects_next() {
                kept.push(node.clone());
                continue;
            }
            match node {
                Node::Rule(rule) => {
                    if let Some(rule) = self.reduce_rule(rule) {
                        kept.push(Node::Rule(rule));
                    }
                }
                Node::AtRule(at_rule) => match &at_rule.body {
                    AtRuleBody::Nested { nodes, trailing } => {
                        let children = self.in_block(|reducer| reducer.reduce_nodes(nodes));
                        if has_content(&children) {
                            kept.push(Node::AtRule(with_children(at_rule, children, trailing)));
                        } else {
                            self.remove_at_rule(at_rule, "no reachable rules");
                        }
                    }
                    _ => kept.push(node.clone()),
                },
                Node::Comment(_) | Node::Opaque(_) => kept.push(node.clone()),
            }
        }

        kept
    }

    fn reduce_rule(&mut self, rule: &StyleRule) -> Option<StyleRule> {
        if rule.selectors.is_empty() {
            tracing::debug!(line = rule.position.line, "dropping rule with an empty selector list");
            return None;
        }
        if comments_in(&rule.block)
            .into_iter()
            .any(|comment| Directive::parse(comment) == Some(Directive::IgnoreCurrent))
        {
            return Some(rule.clone());
        }

        let keep: Vec<bool> = rule
            .selectors
            .iter()
            .map(|selector| self.matcher.is_reachable(selector))
            .collect();

        for (selector, _) in rule.selectors.iter().zip(&keep).filter(|(_, &kept)| !kept) {
            tracing::debug!(selector = %selector, line = rule.position.line, "removing unreachable selector");
            self.rejected.push((selector.clone(), rule.position.line));
        }

        if keep.iter().any(|&kept| kept) {
            Some(rule.retain_selectors(&keep))
        } else {
            None
        }
    }

    fn remove_unused_at_rules(&mut self, nodes: Vec<Node>, usage: &Usage, options: &ReduceOptions) -> Vec<Node> {
        let mut kept = Vec::with_capacity(nodes.len());

        for node in nodes {
            if self.directives.observe(&node) || self.directives.protects_next() {
                kept.push(node);
                continue;
            }
            let Node::AtRule(at_rule) = node else {
                kept.push(node);
                continue;
            };

            if options.keyframes && at_rule.is_keyframes() && !usage.uses_animation(at_rule.prelude_name()) {
                self.remove_at_rule(&at_rule, "unused keyframes");
                continue;
            }
            if options.font_face && at_rule.is_font_face() && !usage.uses_font_face(&at_rule) {
                self.remove_at_rule(&at_rule, "unused font face");
                continue;
            }

            match at_rule.body {
                AtRuleBody::Nested { nodes, trailing } => {
                    let children = self.in_block(|reducer| reducer.remove_unused_at_rules(nodes, usage, options));
                    let has_children = has_content(&children);
                    let at_rule = AtRule {
                        body: AtRuleBody::Nested {
                            nodes: children,
                            trailing,
                        },
                        ..at_rule
                    };
                    if has_children {
                        kept.push(Node::AtRule(at_rule));
                    } else {
                        self.remove_at_rule(&at_rule, "no rules left");
                    }
                }
                _ => kept.push(Node::AtRule(at_rule)),
            }
        }

        kept
    }

    fn remove_at_rule(&mut self, at_rule: &AtRule, reason: &str) {
        tracing::debug!(
            name = %at_rule.name,
            prelude = at_rule.prelude.trim(),
            line = at_rule.position.line,
            reason,
            "removing at-rule"
        );
        self.removed_at_rules.push(RemovedAtRule {
            name: at_rule.name.clone(),
            prelude: at_rule.prelude.trim().to_string(),
            line: at_rule.position.line,
            reason: reason.to_string(),
        });
    }
}

fn has_content(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| !matches!(node, Node::Comment(_)))
}

fn with_children(at_rule: &AtRule, nodes: Vec<Node>, trailing: &str) -> AtRule {
    AtRule {
        leading: at_rule.leading.clone(),
        name: at_rule.name.clone(),
        prelude: at_rule.prelude.clone(),
        body: AtRuleBody::Nested {
            nodes,
            trailing: trailing.to_string(),
        },
        position: at_rule.position,
    }
}

/// Animation and font declaration values of the kept rules
#[derive(Debug, Default)]
struct Usage {
    animations: Vec<String>,
    fonts: Vec<String>,
}

impl Usage {
    fn collect(nodes: &[Node]) -> Usage {
        let mut usage = Usage::default();
        usage.visit(nodes);
        usage
    }

    fn visit(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Rule(rule) => {
                    for declaration in rule.declarations() {
                        match unprefixed(&declaration.name) {
                            "animation" | "animation-name" => self.animations.push(declaration.value),
                            "font" | "font-family" => self.fonts.push(declaration.value),
                            _ => {}
                        }
                    }
                }
                Node::AtRule(AtRule {
                    body: AtRuleBody::Nested { nodes, .. },
                    ..
                }) => self.visit(nodes),
                _ => {}
            }
        }
    }

    fn uses_animation(&self, name: &str) -> bool {
        self.animations.iter().any(|value| {
            value.contains("var(")
                || value
                    .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                    .any(|word| word == name)
        })
    }

    /// Font faces without a `font-family` are kept
    fn uses_font_face(&self, at_rule: &AtRule) -> bool {
        let AtRuleBody::Block(block) = &at_rule.body else {
            return true;
        };
        let Some(family) = parse_declarations(block)
            .into_iter()
            .find(|declaration| declaration.name == "font-family")
            .map(|declaration| declaration.value.trim_matches(|c| c == '"' || c == '\'').to_lowercase())
        else {
            return true;
        };
        self.fonts
            .iter()
            .any(|value| value.contains("var(") || value.to_lowercase().contains(&family))
    }
}

fn unprefixed(property: &str) -> &str {
    ["-webkit-", "-moz-", "-o-", "-ms-"]
        .iter()
        .find_map(|prefix| property.strip_prefix(prefix))
        .unwrap_or(property)
}
