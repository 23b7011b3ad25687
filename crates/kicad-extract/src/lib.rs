pub mod error;
pub mod geometry;
pub mod parsers;
pub mod types;

use error::ExtractError;
use parsers::query::first_list;
use parsers::sexpr::{parse_with_diagnostics, Node};
use serde::Serialize;
use std::path::Path;
use types::{Board, Schematic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Schematic,
    Board,
}

impl DocumentKind {
    pub fn root_tag(self) -> &'static str {
        match self {
            DocumentKind::Schematic => parsers::schematic::ROOT_TAG,
            DocumentKind::Board => parsers::board::ROOT_TAG,
        }
    }

    fn from_root_tag(tag: &str) -> Option<Self> {
        match tag {
            parsers::schematic::ROOT_TAG => Some(DocumentKind::Schematic),
            parsers::board::ROOT_TAG => Some(DocumentKind::Board),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Fail on recovered tokenizer anomalies instead of logging them.
    pub strict: bool,
}

/// Either extracted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Schematic(Schematic),
    Board(Board),
}

/// Detect document kind from file extension.
pub fn detect_kind(path: &Path) -> Option<DocumentKind> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("kicad_sch") => Some(DocumentKind::Schematic),
        Some("kicad_pcb") => Some(DocumentKind::Board),
        _ => None,
    }
}

/// Tokenize `text`, honouring [`ExtractOptions::strict`].
pub fn parse_tree(text: &str, opts: &ExtractOptions) -> Result<Vec<Node>, ExtractError> {
    let parsed = parse_with_diagnostics(text);
    if opts.strict && !parsed.anomalies.is_empty() {
        return Err(ExtractError::Malformed(parsed.anomalies));
    }
    Ok(parsed.nodes)
}

static EMPTY_ROOT: Node = Node::List(Vec::new());

/// The document root, or an empty list so root checks report `(none)`.
fn root_of(nodes: &[Node]) -> &Node {
    first_list(nodes).unwrap_or(&EMPTY_ROOT)
}

pub fn extract_schematic(text: &str, opts: &ExtractOptions) -> Result<Schematic, ExtractError> {
    let nodes = parse_tree(text, opts)?;
    parsers::schematic::extract(root_of(&nodes))
}

pub fn extract_board(text: &str, opts: &ExtractOptions) -> Result<Board, ExtractError> {
    let nodes = parse_tree(text, opts)?;
    parsers::board::extract(root_of(&nodes))
}

/// Extract from text; with no `kind`, the root tag decides.
pub fn extract_str(
    text: &str,
    kind: Option<DocumentKind>,
    opts: &ExtractOptions,
) -> Result<Document, ExtractError> {
    let nodes = parse_tree(text, opts)?;
    let root = root_of(&nodes);
    let kind = match kind {
        Some(k) => k,
        None => {
            let tag = root.tag().unwrap_or("(none)");
            DocumentKind::from_root_tag(tag)
                .ok_or_else(|| ExtractError::UnsupportedFormat(tag.to_string()))?
        }
    };
    match kind {
        DocumentKind::Schematic => parsers::schematic::extract(root).map(Document::Schematic),
        DocumentKind::Board => parsers::board::extract(root).map(Document::Board),
    }
}

/// Like [`extract_str`], replacing invalid UTF-8 rather than failing on it.
pub fn extract_bytes(
    data: &[u8],
    kind: Option<DocumentKind>,
    opts: &ExtractOptions,
) -> Result<Document, ExtractError> {
    extract_str(&String::from_utf8_lossy(data), kind, opts)
}
