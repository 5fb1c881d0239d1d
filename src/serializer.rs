//! Stylesheet serialization.
//!
//! No reformatting: nodes are written back with the whitespace and text they
//! were parsed with. Only selector lists of filtered rules differ from the
//! input.

use crate::stylesheet::{AtRule, AtRuleBody, Node, StyleRule, Stylesheet};

/// Render a stylesheet back to text
pub fn serialize(stylesheet: &Stylesheet) -> String {
    let mut out = String::new();
    write_nodes(&mut out, &stylesheet.nodes);
    out.push_str(&stylesheet.trailing);
    out
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Rule(rule) => write_rule(out, rule),
            Node::AtRule(at_rule) => write_at_rule(out, at_rule),
            Node::Comment(comment) => {
                out.push_str(&comment.leading);
                out.push_str(&comment.text);
            }
            Node::Opaque(opaque) => {
                out.push_str(&opaque.leading);
                out.push_str(&opaque.text);
            }
        }
    }
}

fn write_rule(out: &mut String, rule: &StyleRule) {
    out.push_str(&rule.leading);
    for (index, selector) in rule.selectors.iter().enumerate() {
        if index > 0 {
            out.push_str(rule.separators.get(index - 1).map_or(", ", String::as_str));
        }
        out.push_str(selector);
    }
    out.push_str(&rule.prelude_trailing);
    out.push_str(&rule.block);
}

fn write_at_rule(out: &mut String, at_rule: &AtRule) {
    out.push_str(&at_rule.leading);
    out.push('@');
    out.push_str(&at_rule.name);
    out.push_str(&at_rule.prelude);
    match &at_rule.body {
        AtRuleBody::Statement => out.push(';'),
        AtRuleBody::Block(block) => out.push_str(block),
        AtRuleBody::Nested { nodes, trailing } => {
            out.push('{');
            write_nodes(out, nodes);
            out.push_str(trailing);
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::{parse_stylesheet, SourcePosition};

    #[test]
    fn test_untouched_stylesheet_round_trips() {
        let css = "@import url(base.css);\n\n.a , .b>c{x:y}\n@media screen{\n\t.c{}\n}\n/* end */\n";
        assert_eq!(serialize(&parse_stylesheet(css)), css);
    }

    #[test]
    fn test_missing_separators_fall_back_to_comma() {
        let rule = StyleRule {
            leading: String::new(),
            selectors: vec![".a".into(), ".b".into()],
            separators: Vec::new(),
            prelude_trailing: " ".into(),
            block: "{}".into(),
            position: SourcePosition::default(),
        };
        let sheet = Stylesheet {
            nodes: vec![Node::Rule(rule)],
            trailing: String::new(),
        };
        assert_eq!(serialize(&sheet), ".a, .b {}");
    }

    #[test]
    fn test_empty_stylesheet() {
        assert_eq!(serialize(&Stylesheet::default()), "");
        assert_eq!(serialize(&parse_stylesheet("  \n")), "  \n");
    }
}
