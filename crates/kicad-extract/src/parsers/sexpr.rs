//! S-expression tokenizer and tree builder for KiCad files.
//!
//! Grammar:
//!   node   = list | string | atom
//!   list   = '(' node* ')'
//!   string = '"' ( '\' any | [^"\\] )* '"'
//!   atom   = [^ \t\n\r()"]+
//!
//! An unquoted atom becomes a number only when the whole token parses as a
//! finite `f64`; everything else, quoted or not, stays text.

use log::warn;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Number(f64),
    List(Vec<Node>),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::List(items)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Node::List(_))
    }

    /// Get the text value (if this is a text atom).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the numeric value (if this is a number atom).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Node::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Get all items including the tag.
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Something the tree builder had to paper over while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A `)` with no open list; scanning resumed at top level.
    StrayClose { offset: usize },
    /// Input ended with `depth` lists still open; they were closed implicitly.
    UnclosedList { depth: usize },
    /// Input ended inside a quoted string starting at `offset`.
    UnterminatedString { offset: usize },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::StrayClose { offset } => write!(f, "unmatched ')' at byte {offset}"),
            Anomaly::UnclosedList { depth } => {
                write!(f, "{depth} list(s) still open at end of input")
            }
            Anomaly::UnterminatedString { offset } => {
                write!(f, "unterminated string starting at byte {offset}")
            }
        }
    }
}

/// Top-level nodes plus whatever had to be recovered to produce them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parsed {
    pub nodes: Vec<Node>,
    pub anomalies: Vec<Anomaly>,
}

enum Token<'a> {
    Open,
    Close,
    Quoted { text: String, terminated: bool },
    Bare(&'a str),
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn read_quoted(&mut self) -> (String, bool) {
        // Skip opening quote
        self.pos += 1;
        let mut text = String::new();
        let mut chars = self.input[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return (text, true);
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => text.push(escaped),
                    None => break,
                },
                _ => text.push(c),
            }
        }
        self.pos = self.input.len();
        (text, false)
    }

    fn read_bare(&mut self) -> &'a str {
        let bytes = self.input.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' | b'(' | b')' | b'"' => break,
                _ => self.pos += 1,
            }
        }
        &self.input[start..self.pos]
    }

    /// Next token and the byte offset it started at.
    fn next_token(&mut self) -> Option<(usize, Token<'a>)> {
        self.skip_whitespace();
        let offset = self.pos;
        let token = match *self.input.as_bytes().get(self.pos)? {
            b'(' => {
                self.pos += 1;
                Token::Open
            }
            b')' => {
                self.pos += 1;
                Token::Close
            }
            b'"' => {
                let (text, terminated) = self.read_quoted();
                Token::Quoted { text, terminated }
            }
            _ => Token::Bare(self.read_bare()),
        };
        Some((offset, token))
    }
}

/// Numeric value of an unquoted token, if it is one.
///
/// Requires a numeric-looking first character so that `inf`/`nan` spellings
/// stay text, and a finite result so overflowing literals do too.
pub(crate) fn numeric_value(token: &str) -> Option<f64> {
    let numeric_lead = matches!(
        token.as_bytes().first(),
        Some(b'0'..=b'9' | b'+' | b'-' | b'.')
    );
    if !numeric_lead {
        return None;
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn classify(token: &str) -> Node {
    match numeric_value(token) {
        Some(v) => Node::Number(v),
        None => Node::Text(token.to_string()),
    }
}

fn push_node(frames: &mut [Vec<Node>], node: Node) {
    if let Some(top) = frames.last_mut() {
        top.push(node);
    }
}

/// Parse text into its top-level nodes, collecting recovery anomalies.
pub fn parse_with_diagnostics(input: &str) -> Parsed {
    let mut tokenizer = Tokenizer::new(input);
    let mut anomalies = Vec::new();
    // frames[0] is the implicit root frame
    let mut frames: Vec<Vec<Node>> = vec![Vec::new()];

    while let Some((offset, token)) = tokenizer.next_token() {
        match token {
            Token::Open => frames.push(Vec::new()),
            Token::Close => {
                let closed = frames.pop().unwrap_or_default();
                if let Some(parent) = frames.last_mut() {
                    parent.push(Node::List(closed));
                } else {
                    // Popped the root itself: put it back and carry on.
                    warn!("unmatched ')' at byte {offset}, continuing at top level");
                    anomalies.push(Anomaly::StrayClose { offset });
                    frames.push(closed);
                }
            }
            Token::Quoted { text, terminated } => {
                if !terminated {
                    warn!("unterminated string starting at byte {offset}");
                    anomalies.push(Anomaly::UnterminatedString { offset });
                }
                push_node(&mut frames, Node::Text(text));
            }
            Token::Bare(token) => push_node(&mut frames, classify(token)),
        }
    }

    if frames.len() > 1 {
        let depth = frames.len() - 1;
        warn!("{depth} list(s) left open at end of input, closing them");
        anomalies.push(Anomaly::UnclosedList { depth });
        while frames.len() > 1 {
            let closed = frames.pop().unwrap_or_default();
            push_node(&mut frames, Node::List(closed));
        }
    }

    Parsed {
        nodes: frames.pop().unwrap_or_default(),
        anomalies,
    }
}

/// Parse text into its top-level nodes.
///
/// Never fails: malformed input is recovered as described on [`Anomaly`].
pub fn parse(input: &str) -> Vec<Node> {
    parse_with_diagnostics(input).nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn single(input: &str) -> Node {
        let mut nodes = parse(input);
        assert_eq!(nodes.len(), 1, "expected one top-level node in {input:?}");
        nodes.remove(0)
    }

    #[test]
    fn test_simple_list() {
        let result = single("(hello world)");
        assert_eq!(
            result,
            Node::list(vec![Node::text("hello"), Node::text("world")])
        );
    }

    #[test]
    fn test_nested() {
        let result = single("(a (b 1) (c 2))");
        let items = result.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[1],
            Node::list(vec![Node::text("b"), Node::Number(1.0)])
        );
    }

    #[rstest]
    #[case("42", 42.0)]
    #[case("-3.5", -3.5)]
    #[case("1e3", 1000.0)]
    #[case("+2", 2.0)]
    #[case(".5", 0.5)]
    fn test_numeric_tokens_become_numbers(#[case] token: &str, #[case] expected: f64) {
        assert_eq!(parse(token), vec![Node::Number(expected)]);
    }

    #[rstest]
    #[case("F.Cu", "F.Cu")]
    #[case("R1", "R1")]
    #[case("\"\"", "")]
    #[case("\"42\"", "42")]
    #[case("5.1.0", "5.1.0")]
    #[case("1N4148", "1N4148")]
    #[case("inf", "inf")]
    #[case("nan", "nan")]
    #[case("1e999", "1e999")]
    #[case("-", "-")]
    fn test_other_tokens_stay_text(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(parse(token), vec![Node::text(expected)]);
    }

    #[test]
    fn test_string_escapes() {
        let result = single(r#"(s "say \"hi\"" "a\\b" "x\ny")"#);
        let items = result.as_list().unwrap();
        assert_eq!(items[1].as_text(), Some("say \"hi\""));
        assert_eq!(items[2].as_text(), Some("a\\b"));
        assert_eq!(items[3].as_text(), Some("xny"));
    }

    #[test]
    fn test_string_with_delimiters_and_unicode() {
        let result = single("(t \"(a b) ÷ µ\")");
        assert_eq!(result.as_list().unwrap()[1].as_text(), Some("(a b) ÷ µ"));
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_with_diagnostics("  \n\t ");
        assert!(parsed.nodes.is_empty());
        assert!(parsed.anomalies.is_empty());
    }

    #[test]
    fn test_multiple_top_level_items() {
        let nodes = parse("(a) b (c)");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], Node::text("b"));
    }

    #[test]
    fn test_stray_close_recovers() {
        let parsed = parse_with_diagnostics("(a 1)) (b 2)");
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(
            parsed.nodes[1],
            Node::list(vec![Node::text("b"), Node::Number(2.0)])
        );
        assert_eq!(parsed.anomalies, vec![Anomaly::StrayClose { offset: 5 }]);
    }

    #[test]
    fn test_leading_stray_close() {
        let nodes = parse(") (ok)");
        assert_eq!(nodes, vec![Node::list(vec![Node::text("ok")])]);
    }

    #[test]
    fn test_unclosed_lists_are_closed() {
        let parsed = parse_with_diagnostics("(a (b 1");
        assert_eq!(
            parsed.nodes,
            vec![Node::list(vec![
                Node::text("a"),
                Node::list(vec![Node::text("b"), Node::Number(1.0)]),
            ])]
        );
        assert_eq!(parsed.anomalies, vec![Anomaly::UnclosedList { depth: 2 }]);
    }

    #[test]
    fn test_unterminated_string() {
        let parsed = parse_with_diagnostics("(a \"abc");
        assert_eq!(
            parsed.anomalies,
            vec![
                Anomaly::UnterminatedString { offset: 3 },
                Anomaly::UnclosedList { depth: 1 },
            ]
        );
        assert_eq!(
            parsed.nodes,
            vec![Node::list(vec![Node::text("a"), Node::text("abc")])]
        );
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(single("()"), Node::list(vec![]));
    }
}
