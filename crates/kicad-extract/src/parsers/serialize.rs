//! Rendering a [`Node`] tree back to S-expression text.
//!
//! The output is canonical rather than byte-identical to the source: spacing
//! and line breaks are ours, but re-parsing it yields the same tree.

use super::sexpr::{numeric_value, Node};
use std::fmt::{self, Write};

const INDENT: &str = "  ";

/// Shortest text that parses back to exactly `v`.
pub fn format_number(v: f64) -> String {
    format!("{v}")
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || numeric_value(text).is_some()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\\'))
}

fn write_text<W: Write>(out: &mut W, text: &str) -> fmt::Result {
    if !needs_quotes(text) {
        return out.write_str(text);
    }
    out.write_char('"')?;
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.write_char('\\')?;
        }
        out.write_char(c)?;
    }
    out.write_char('"')
}

/// Single-line form, e.g. `(at 1.5 2 90)`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(s) => write_text(f, s),
            Node::Number(v) => f.write_str(&format_number(*v)),
            Node::List(items) => {
                f.write_char('(')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(')')
            }
        }
    }
}

fn write_indented(out: &mut String, node: &Node, depth: usize) -> fmt::Result {
    let items = match node {
        Node::List(items) if items.iter().any(Node::is_list) => items,
        _ => return write!(out, "{node}"),
    };

    out.push('(');
    let mut broken = false;
    for (i, item) in items.iter().enumerate() {
        // Leading atoms share the opening line; from the first nested list
        // on, every item gets its own line.
        if item.is_list() || broken {
            broken = true;
            out.push('\n');
            for _ in 0..=depth {
                out.push_str(INDENT);
            }
        } else if i > 0 {
            out.push(' ');
        }
        write_indented(out, item, depth + 1)?;
    }
    out.push(')');
    Ok(())
}

/// Multi-line canonical text for a sequence of top-level nodes.
pub fn to_canonical(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        // Writing into a String cannot fail.
        let _ = write_indented(&mut out, node, 0);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::sexpr::parse;

    fn sample_tree() -> Vec<Node> {
        vec![Node::list(vec![
            Node::text("kicad_pcb"),
            Node::list(vec![Node::text("version"), Node::Number(20240108.0)]),
            Node::list(vec![
                Node::text("footprint"),
                Node::text("Resistor_SMD:R_0402"),
                Node::list(vec![
                    Node::text("at"),
                    Node::Number(10.5),
                    Node::Number(-3.25),
                    Node::Number(90.0),
                ]),
                Node::list(vec![
                    Node::text("property"),
                    Node::text("Reference"),
                    Node::text("R 1 \"x\" \\"),
                ]),
                Node::text("locked"),
            ]),
            Node::list(vec![Node::text("net"), Node::Number(0.0), Node::text("")]),
            Node::list(vec![Node::text("name"), Node::text("42")]),
            Node::list(vec![]),
        ])]
    }

    #[test]
    fn test_round_trip_canonical() {
        let tree = sample_tree();
        assert_eq!(parse(&to_canonical(&tree)), tree);
    }

    #[test]
    fn test_round_trip_compact() {
        let tree = sample_tree();
        assert_eq!(parse(&tree[0].to_string()), tree);
    }

    #[test]
    fn test_round_trip_from_text() {
        let text = "(kicad_sch (version 20231120) (generator \"eeschema\")\n\t(paper \"A4\")\n\t(wire (pts (xy 1.27 2.54) (xy 5 2.54))))";
        let once = parse(text);
        let twice = parse(&to_canonical(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_quoting_rules() {
        assert_eq!(Node::text("F.Cu").to_string(), "F.Cu");
        assert_eq!(Node::text("").to_string(), "\"\"");
        assert_eq!(Node::text("42").to_string(), "\"42\"");
        assert_eq!(Node::text("a b").to_string(), "\"a b\"");
        assert_eq!(Node::text("say \"hi\"").to_string(), r#""say \"hi\"""#);
        assert_eq!(Node::Number(1.0).to_string(), "1");
        assert_eq!(Node::Number(-0.05).to_string(), "-0.05");
    }

    #[test]
    fn test_canonical_layout() {
        let tree = parse("(a x (b 1 2) y (c (d)))");
        assert_eq!(
            to_canonical(&tree),
            "(a x\n  (b 1 2)\n  y\n  (c\n    (d)))\n"
        );
    }
}
