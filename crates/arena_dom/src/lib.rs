//! Arena-allocated DOM implementing the parser's `TreeSink` capability.
//!
//! Nodes live in one `Vec` addressed by stable `NodeId` handles; there are no
//! ownership cycles, and the parser's own parent-lookup table stays the source
//! of truth during construction (this arena tracks parents too, for hosts that
//! want to traverse afterwards).
//!
//! Includes a deterministic snapshot renderer in the html5lib tree format
//! (`| <tag>`, `|   attr="v"`, `| "text"`). The snapshot is a test comparison
//! format, not a public stable serialization.

use std::fmt::Write as _;

use html5::{Attribute, DocumentMode, ElemName, Namespace, TreeSink};

/// Stable index handle into the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Clone, Debug, Default)]
pub struct Doctype {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

#[derive(Debug)]
pub enum NodeData {
    Document {
        mode: DocumentMode,
        doctype: Option<Doctype>,
    },
    Fragment,
    Element {
        name: String,
        ns: Namespace,
        attrs: Vec<Attribute>,
        template_content: Option<NodeId>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct ArenaDom {
    nodes: Vec<Node>,
}

impl ArenaDom {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.node(id).data
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    fn unlink(&mut self, child: NodeId) {
        if let Some(parent) = self.node(child).parent {
            let siblings = &mut self.node_mut(parent).children;
            if let Some(index) = siblings.iter().position(|&id| id == child) {
                let _ = siblings.remove(index);
            }
        }
        self.node_mut(child).parent = None;
    }

    /// Render the subtree in the html5lib tree-construction test format.
    pub fn snapshot(&self, root: NodeId) -> String {
        let mut out = String::new();
        match self.data(root) {
            NodeData::Document {
                doctype: Some(doctype),
                ..
            } => {
                if doctype.public_id.is_empty() && doctype.system_id.is_empty() {
                    if doctype.name.is_empty() {
                        out.push_str("| <!DOCTYPE >\n");
                    } else {
                        let _ = writeln!(out, "| <!DOCTYPE {}>", doctype.name);
                    }
                } else {
                    let _ = writeln!(
                        out,
                        "| <!DOCTYPE {} \"{}\" \"{}\">",
                        doctype.name, doctype.public_id, doctype.system_id
                    );
                }
            }
            _ => {}
        }
        for &child in self.children(root) {
            self.snapshot_node(child, 0, &mut out);
        }
        out
    }

    fn snapshot_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match self.data(id) {
            NodeData::Element {
                name,
                ns,
                attrs,
                template_content,
            } => {
                let shown = match ns {
                    Namespace::Svg => format!("svg {name}"),
                    Namespace::MathMl => format!("math {name}"),
                    _ => name.clone(),
                };
                let _ = writeln!(out, "| {pad}<{shown}>");
                let mut sorted: Vec<&Attribute> = attrs.iter().collect();
                sorted.sort_by(|a, b| {
                    let a_key = (a.prefix.unwrap_or(""), a.name.as_str());
                    let b_key = (b.prefix.unwrap_or(""), b.name.as_str());
                    a_key.cmp(&b_key)
                });
                for attr in sorted {
                    match attr.prefix {
                        Some(prefix) => {
                            let _ = writeln!(
                                out,
                                "| {pad}  {} {}=\"{}\"",
                                prefix, attr.name, attr.value
                            );
                        }
                        None => {
                            let _ = writeln!(out, "| {pad}  {}=\"{}\"", attr.name, attr.value);
                        }
                    }
                }
                if let Some(content) = template_content {
                    let _ = writeln!(out, "| {pad}  content");
                    for &child in self.children(*content) {
                        self.snapshot_node(child, depth + 2, out);
                    }
                }
                for &child in self.children(id) {
                    self.snapshot_node(child, depth + 1, out);
                }
            }
            NodeData::Text(text) => {
                let _ = writeln!(out, "| {pad}\"{text}\"");
            }
            NodeData::Comment(text) => {
                let _ = writeln!(out, "| {pad}<!-- {text} -->");
            }
            NodeData::Document { .. } | NodeData::Fragment => {
                for &child in self.children(id) {
                    self.snapshot_node(child, depth, out);
                }
            }
        }
    }
}

impl TreeSink for ArenaDom {
    type Handle = NodeId;

    fn create_document(&mut self) -> NodeId {
        self.alloc(NodeData::Document {
            mode: DocumentMode::NoQuirks,
            doctype: None,
        })
    }

    fn create_document_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::Fragment)
    }

    fn create_element(&mut self, tag_name: &str, ns: Namespace, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(NodeData::Element {
            name: tag_name.to_string(),
            ns,
            attrs,
            template_content: None,
        })
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.unlink(child);
        let children = &mut self.node_mut(parent).children;
        let index = children
            .iter()
            .position(|&id| id == reference)
            .unwrap_or(children.len());
        children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    fn detach_node(&mut self, node: NodeId) {
        self.unlink(node);
    }

    fn insert_text(&mut self, parent: NodeId, text: &str) {
        // Coalesce with a trailing text node, as character insertion requires.
        if let Some(&last) = self.node(parent).children.last() {
            if let NodeData::Text(existing) = &mut self.node_mut(last).data {
                existing.push_str(text);
                return;
            }
        }
        let node = self.alloc(NodeData::Text(text.to_string()));
        self.append_child(parent, node);
    }

    fn insert_text_before(&mut self, parent: NodeId, text: &str, reference: NodeId) {
        let index = self
            .node(parent)
            .children
            .iter()
            .position(|&id| id == reference);
        if let Some(index) = index {
            if index > 0 {
                let before = self.node(parent).children[index - 1];
                if let NodeData::Text(existing) = &mut self.node_mut(before).data {
                    existing.push_str(text);
                    return;
                }
            }
            let node = self.alloc(NodeData::Text(text.to_string()));
            self.insert_before(parent, node, reference);
        } else {
            self.insert_text(parent, text);
        }
    }

    fn adopt_attributes(&mut self, recipient: NodeId, attrs: Vec<Attribute>) {
        if let NodeData::Element {
            attrs: existing, ..
        } = &mut self.node_mut(recipient).data
        {
            for attr in attrs {
                if !existing.iter().any(|e| e.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn set_template_content(&mut self, template: NodeId, content: NodeId) {
        if let NodeData::Element {
            template_content, ..
        } = &mut self.node_mut(template).data
        {
            *template_content = Some(content);
        }
    }

    fn template_content(&self, template: NodeId) -> Option<NodeId> {
        match self.data(template) {
            NodeData::Element {
                template_content, ..
            } => *template_content,
            _ => None,
        }
    }

    fn set_document_type(
        &mut self,
        document: NodeId,
        name: &str,
        public_id: &str,
        system_id: &str,
    ) {
        if let NodeData::Document { doctype, .. } = &mut self.node_mut(document).data {
            *doctype = Some(Doctype {
                name: name.to_string(),
                public_id: public_id.to_string(),
                system_id: system_id.to_string(),
            });
        }
    }

    fn set_document_mode(&mut self, document: NodeId, mode: DocumentMode) {
        if let NodeData::Document { mode: slot, .. } = &mut self.node_mut(document).data {
            *slot = mode;
        }
    }

    fn document_mode(&self, document: NodeId) -> DocumentMode {
        match self.data(document) {
            NodeData::Document { mode, .. } => *mode,
            _ => DocumentMode::NoQuirks,
        }
    }

    fn element_name(&self, element: NodeId) -> ElemName<'_> {
        match self.data(element) {
            NodeData::Element { name, ns, .. } => ElemName { name, ns: *ns },
            // Non-element handles never reach the accessor during a parse;
            // answer with an impossible HTML name instead of panicking.
            _ => ElemName {
                name: "#non-element",
                ns: Namespace::Html,
            },
        }
    }

    fn element_attributes(&self, element: NodeId) -> &[Attribute] {
        match self.data(element) {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).children.first().copied()
    }
}
