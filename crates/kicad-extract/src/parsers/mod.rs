pub mod board;
pub mod query;
pub mod schematic;
pub mod serialize;
pub mod sexpr;

use crate::error::ExtractError;
use crate::types::{Size, Text, TitleBlock};
use query::{coordinate, font_size, is_hidden};
use sexpr::Node;

/// KiCad's default text height/width in millimetres.
pub(crate) const DEFAULT_FONT_SIZE: f64 = 1.27;

/// Fail unless `root` is a list headed by `expected`.
pub(crate) fn expect_root(root: &Node, expected: &str) -> Result<(), ExtractError> {
    match root.tag() {
        Some(tag) if tag == expected => Ok(()),
        other => Err(ExtractError::Format {
            expected: expected.to_string(),
            actual: other.unwrap_or("(none)").to_string(),
        }),
    }
}

pub(crate) fn uuid_of(node: &Node) -> String {
    node.text_value("uuid")
        .or_else(|| node.text_value("tstamp"))
        .unwrap_or_default()
}

pub(crate) fn parse_title_block(root: &Node) -> TitleBlock {
    let Some(block) = root.find("title_block") else {
        return TitleBlock::default();
    };
    TitleBlock {
        title: block.text_value("title").unwrap_or_default(),
        date: block.text_value("date").unwrap_or_default(),
        revision: block.text_value("rev").unwrap_or_default(),
        company: block.text_value("company").unwrap_or_default(),
        comments: block
            .find_all("comment")
            .iter()
            .filter_map(|c| c.text_at(1))
            .collect(),
    }
}

/// Text item whose string is the `index`th atom after the tag.
pub(crate) fn parse_text(node: &Node, index: usize) -> Text {
    let at = coordinate(node, "at");
    Text {
        text: node.text_at(index).unwrap_or_default(),
        at: at.map(|c| c.point()).unwrap_or_default(),
        rotation: at.map(|c| c.rotation_or_zero()).unwrap_or(0.0),
        font_size: font_size(node).unwrap_or(Size::new(DEFAULT_FONT_SIZE, DEFAULT_FONT_SIZE)),
        visible: !is_hidden(node, index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sexpr::parse;

    #[test]
    fn test_expect_root() {
        let root = parse("(kicad_sch)").remove(0);
        assert!(expect_root(&root, "kicad_sch").is_ok());
        let err = expect_root(&root, "kicad_pcb").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected root tag 'kicad_pcb', found 'kicad_sch'"
        );
    }

    #[test]
    fn test_title_block() {
        let root = parse(
            "(kicad_pcb (title_block (title \"Amp\") (rev \"B\") (comment 1 \"first\") (comment 2 \"second\")))",
        )
        .remove(0);
        let block = parse_title_block(&root);
        assert_eq!(block.title, "Amp");
        assert_eq!(block.revision, "B");
        assert_eq!(block.company, "");
        assert_eq!(block.comments, vec!["first", "second"]);
    }

    #[test]
    fn test_uuid_falls_back_to_tstamp() {
        let root = parse("(x (tstamp \"abc\"))").remove(0);
        assert_eq!(uuid_of(&root), "abc");
    }
}
