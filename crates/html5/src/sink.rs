//! Tree-building capability interface.
//!
//! The parser core never sees a concrete node representation: it drives an
//! opaque-handle `TreeSink` supplied by the host. The sink is assumed
//! synchronous and non-reentrant with respect to a single parse.
//!
//! Invariants the parser relies on:
//! - Handles are cheap to copy and stable for the lifetime of the parse.
//! - A node has at most one parent; `detach_node` severs the link.
//! - `adopt_attributes` merges without overwriting existing names.

use std::fmt::Debug;
use std::hash::Hash;

use crate::token::Attribute;

/// Element namespace. The three element namespaces plus the three attribute
/// namespaces used by the foreign-attribute adjustment tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Html,
    MathMl,
    Svg,
    XLink,
    Xml,
    Xmlns,
}

impl Namespace {
    pub fn uri(self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::XLink => "http://www.w3.org/1999/xlink",
            Namespace::Xml => "http://www.w3.org/XML/1998/namespace",
            Namespace::Xmlns => "http://www.w3.org/2000/xmlns/",
        }
    }
}

/// Document compatibility mode selected by doctype classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DocumentMode {
    #[default]
    NoQuirks,
    LimitedQuirks,
    Quirks,
}

/// Engine invariant violation (bug or broken sink collaborator), not a
/// recoverable HTML error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineInvariantError;

/// Borrowed element identity returned by the sink's accessors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElemName<'a> {
    pub name: &'a str,
    pub ns: Namespace,
}

/// DOM mutation capability consumed by the tree-construction parser.
///
/// Accessor methods returning `Option` signal a contract violation with
/// `None` (e.g. asking a non-template for template content); the parser
/// propagates that as `EngineInvariantError` rather than recovering.
pub trait TreeSink {
    type Handle: Copy + Eq + Hash + Debug;

    fn create_document(&mut self) -> Self::Handle;
    fn create_document_fragment(&mut self) -> Self::Handle;
    fn create_element(
        &mut self,
        tag_name: &str,
        ns: Namespace,
        attrs: Vec<Attribute>,
    ) -> Self::Handle;
    fn create_comment(&mut self, text: &str) -> Self::Handle;

    fn append_child(&mut self, parent: Self::Handle, child: Self::Handle);
    fn insert_before(&mut self, parent: Self::Handle, child: Self::Handle, reference: Self::Handle);
    fn detach_node(&mut self, node: Self::Handle);

    fn insert_text(&mut self, parent: Self::Handle, text: &str);
    fn insert_text_before(&mut self, parent: Self::Handle, text: &str, reference: Self::Handle);

    /// Merge `attrs` into `recipient` without overwriting existing names.
    fn adopt_attributes(&mut self, recipient: Self::Handle, attrs: Vec<Attribute>);

    fn set_template_content(&mut self, template: Self::Handle, content: Self::Handle);
    fn template_content(&self, template: Self::Handle) -> Option<Self::Handle>;

    fn set_document_type(
        &mut self,
        document: Self::Handle,
        name: &str,
        public_id: &str,
        system_id: &str,
    );
    fn set_document_mode(&mut self, document: Self::Handle, mode: DocumentMode);
    fn document_mode(&self, document: Self::Handle) -> DocumentMode;

    fn element_name(&self, element: Self::Handle) -> ElemName<'_>;
    fn element_attributes(&self, element: Self::Handle) -> &[Attribute];
    fn first_child(&self, node: Self::Handle) -> Option<Self::Handle>;
}
