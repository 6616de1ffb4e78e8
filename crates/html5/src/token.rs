//! HTML5 token model.
//!
//! Determinism contract:
//! - Attributes on a tag are stored in encounter order; no sorting, no
//!   hash-based storage.
//! - Duplicate attributes in a single tag are dropped after the first
//!   occurrence (tokenizer "first-wins" behavior).
//! - Adjacent characters of the same kind are coalesced into one token; a run
//!   splits when its kind changes.

use crate::sink::Namespace;

/// Kind of an accumulated character run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacterKind {
    /// At least one non-whitespace, non-NUL character.
    Ordinary,
    /// Whitespace only (TAB, LF, FF, CR, SPACE).
    Whitespace,
    /// U+0000 only.
    Null,
}

impl CharacterKind {
    pub(crate) fn of(ch: char) -> Self {
        match ch {
            '\0' => CharacterKind::Null,
            '\t' | '\n' | '\x0C' | '\r' | ' ' => CharacterKind::Whitespace,
            _ => CharacterKind::Ordinary,
        }
    }
}

/// Attribute with optional namespace/prefix (assigned during foreign-content
/// adjustment; plain HTML attributes carry neither).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<&'static str>,
    pub ns: Option<Namespace>,
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prefix: None,
            ns: None,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Start or end tag. The name is ASCII-folded to lowercase as consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagToken {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub self_closing: bool,
    /// Set by the tree builder when the self-closing flag is acted upon.
    pub ack_self_closing: bool,
}

impl TagToken {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            self_closing: false,
            ack_self_closing: false,
        }
    }

    /// Value of the first attribute with `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoctypeToken {
    pub name: Option<String>,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub force_quirks: bool,
}

/// Token stream element. Created by the tokenizer, consumed exactly once by
/// the tree-construction parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Characters { kind: CharacterKind, text: String },
    StartTag(TagToken),
    EndTag(TagToken),
    Comment(String),
    Doctype(DoctypeToken),
    Eof,
    /// More input is required; the parse loop must suspend until the caller
    /// supplies another chunk.
    Hibernation,
}
