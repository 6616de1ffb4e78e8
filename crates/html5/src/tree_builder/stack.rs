//! Stack of open elements.
//!
//! Entries cache the tag name and namespace captured at push time so hot-path
//! scope checks never re-query the sink. Invariant: after bootstrap the stack
//! is never empty until parsing stops; entry 0 is the root `html` element (or
//! the fragment case's synthetic `html`).

use crate::sink::Namespace;
use crate::tags;

#[derive(Clone, Debug)]
pub(crate) struct OpenElement<H> {
    pub element: H,
    pub name: String,
    pub ns: Namespace,
}

impl<H> OpenElement<H> {
    pub(crate) fn is_html(&self, name: &str) -> bool {
        self.ns == Namespace::Html && self.name == name
    }
}

/// Scope flavor for the scope predicates. The flavor is chosen by the calling
/// algorithm context, not as a property of a tag name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    Default,
    Button,
    ListItem,
    Table,
    Select,
}

fn is_scope_boundary(name: &str, ns: Namespace, scope: Scope) -> bool {
    match scope {
        Scope::Default => match ns {
            Namespace::Html => matches!(
                name,
                "applet" | "caption" | "html" | "table" | "td" | "th" | "marquee" | "object"
                    | "template"
            ),
            Namespace::MathMl => {
                matches!(name, "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml")
            }
            Namespace::Svg => matches!(name, "foreignObject" | "desc" | "title"),
            _ => false,
        },
        Scope::Button => {
            is_scope_boundary(name, ns, Scope::Default) || (ns == Namespace::Html && name == "button")
        }
        Scope::ListItem => {
            is_scope_boundary(name, ns, Scope::Default)
                || (ns == Namespace::Html && matches!(name, "ol" | "ul"))
        }
        Scope::Table => ns == Namespace::Html && matches!(name, "html" | "table" | "template"),
        // Select scope is inverted: everything except optgroup/option bounds it.
        Scope::Select => !(ns == Namespace::Html && matches!(name, "optgroup" | "option")),
    }
}

#[derive(Debug)]
pub(crate) struct OpenElementStack<H> {
    items: Vec<OpenElement<H>>,
    template_count: usize,
}

impl<H: Copy + Eq> OpenElementStack<H> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            template_count: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&OpenElement<H>> {
        self.items.get(index)
    }

    pub(crate) fn current(&self) -> Option<&OpenElement<H>> {
        self.items.last()
    }

    pub(crate) fn push(&mut self, element: H, name: impl Into<String>, ns: Namespace) {
        let entry = OpenElement {
            element,
            name: name.into(),
            ns,
        };
        if entry.is_html("template") {
            self.template_count += 1;
        }
        self.items.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<OpenElement<H>> {
        let entry = self.items.pop()?;
        if entry.is_html("template") {
            self.template_count -= 1;
        }
        Some(entry)
    }

    pub(crate) fn has_template(&self) -> bool {
        self.template_count > 0
    }

    pub(crate) fn contains(&self, element: H) -> bool {
        self.index_of(element).is_some()
    }

    pub(crate) fn index_of(&self, element: H) -> Option<usize> {
        self.items.iter().rposition(|entry| entry.element == element)
    }

    pub(crate) fn remove(&mut self, element: H) {
        if let Some(index) = self.index_of(element) {
            if self.items[index].is_html("template") {
                self.template_count -= 1;
            }
            let _ = self.items.remove(index);
        }
    }

    /// Replace `old` in place, keeping its stack position.
    pub(crate) fn replace(&mut self, old: H, element: H, name: impl Into<String>, ns: Namespace) {
        if let Some(index) = self.index_of(old) {
            self.items[index] = OpenElement {
                element,
                name: name.into(),
                ns,
            };
        }
    }

    /// Insert a new entry immediately above `reference`.
    pub(crate) fn insert_after(
        &mut self,
        reference: H,
        element: H,
        name: impl Into<String>,
        ns: Namespace,
    ) {
        let entry = OpenElement {
            element,
            name: name.into(),
            ns,
        };
        if entry.is_html("template") {
            self.template_count += 1;
        }
        match self.index_of(reference) {
            Some(index) => self.items.insert(index + 1, entry),
            None => self.items.push(entry),
        }
    }

    /// The stack entry immediately below `element` (adoption agency only).
    pub(crate) fn common_ancestor(&self, element: H) -> Option<H> {
        let index = self.index_of(element)?;
        index.checked_sub(1).map(|below| self.items[below].element)
    }

    fn scope_walk(&self, scope: Scope, matches: impl Fn(&OpenElement<H>) -> bool) -> bool {
        for entry in self.items.iter().rev() {
            if matches(entry) {
                return true;
            }
            if is_scope_boundary(&entry.name, entry.ns, scope) {
                return false;
            }
        }
        false
    }

    pub(crate) fn has_in_scope(&self, name: &str, scope: Scope) -> bool {
        self.scope_walk(scope, |entry| entry.ns == Namespace::Html && entry.name == name)
    }

    pub(crate) fn has_element_in_scope(&self, element: H) -> bool {
        self.scope_walk(Scope::Default, |entry| entry.element == element)
    }

    /// The namespace check guards the whole h1..h6 disjunction.
    pub(crate) fn has_numbered_header_in_scope(&self) -> bool {
        self.scope_walk(Scope::Default, |entry| {
            entry.ns == Namespace::Html && tags::is_numbered_header(&entry.name)
        })
    }

    pub(crate) fn generate_implied_end_tags(&mut self, exclude: Option<&str>) {
        while let Some(entry) = self.current() {
            if entry.ns == Namespace::Html
                && tags::is_implied_end_tag(&entry.name)
                && exclude != Some(entry.name.as_str())
            {
                let _ = self.pop();
            } else {
                break;
            }
        }
    }

    pub(crate) fn generate_implied_end_tags_thoroughly(&mut self) {
        while let Some(entry) = self.current() {
            if entry.ns == Namespace::Html && tags::is_implied_end_tag_thorough(&entry.name) {
                let _ = self.pop();
            } else {
                break;
            }
        }
    }

    /// Pop inclusively until an HTML element named `name` has been popped.
    pub(crate) fn pop_until_tag_name_popped(&mut self, name: &str) {
        while let Some(entry) = self.pop() {
            if entry.is_html(name) {
                break;
            }
        }
    }

    pub(crate) fn pop_until_element_popped(&mut self, element: H) {
        while let Some(entry) = self.pop() {
            if entry.element == element {
                break;
            }
        }
    }

    pub(crate) fn pop_until_numbered_header_popped(&mut self) {
        while let Some(entry) = self.pop() {
            if entry.ns == Namespace::Html && tags::is_numbered_header(&entry.name) {
                break;
            }
        }
    }

    pub(crate) fn pop_until_table_cell_popped(&mut self) {
        while let Some(entry) = self.pop() {
            if entry.ns == Namespace::Html && matches!(entry.name.as_str(), "td" | "th") {
                break;
            }
        }
    }

    pub(crate) fn clear_back_to_table_context(&mut self) {
        self.clear_back_to(&["table", "template", "html"]);
    }

    pub(crate) fn clear_back_to_table_body_context(&mut self) {
        self.clear_back_to(&["tbody", "tfoot", "thead", "template", "html"]);
    }

    pub(crate) fn clear_back_to_table_row_context(&mut self) {
        self.clear_back_to(&["tr", "template", "html"]);
    }

    fn clear_back_to(&mut self, stop: &[&str]) {
        while let Some(entry) = self.current() {
            if entry.ns == Namespace::Html && stop.contains(&entry.name.as_str()) {
                break;
            }
            let _ = self.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OpenElementStack, Scope};
    use crate::sink::Namespace;

    fn stack_of(names: &[&str]) -> OpenElementStack<u32> {
        let mut stack = OpenElementStack::new();
        for (index, name) in names.iter().enumerate() {
            stack.push(index as u32, *name, Namespace::Html);
        }
        stack
    }

    #[test]
    fn scope_queries_stop_at_boundaries() {
        let stack = stack_of(&["html", "body", "p"]);
        assert!(stack.has_in_scope("p", Scope::Default));
        assert!(stack.has_in_scope("p", Scope::Button));

        let hidden = stack_of(&["html", "body", "p", "table", "tr"]);
        assert!(!hidden.has_in_scope("p", Scope::Default));
        assert!(hidden.has_in_scope("tr", Scope::Table));
        assert!(!hidden.has_in_scope("p", Scope::Table));

        let buttoned = stack_of(&["html", "body", "p", "button", "span"]);
        assert!(buttoned.has_in_scope("p", Scope::Default));
        assert!(!buttoned.has_in_scope("p", Scope::Button));

        let listed = stack_of(&["html", "body", "li", "ul", "span"]);
        assert!(!listed.has_in_scope("li", Scope::ListItem));
        assert!(listed.has_in_scope("li", Scope::Default));
    }

    #[test]
    fn select_scope_is_inverted() {
        let stack = stack_of(&["html", "body", "select", "optgroup", "option"]);
        assert!(stack.has_in_scope("select", Scope::Select));

        let fenced = stack_of(&["html", "body", "select", "div", "option"]);
        assert!(!fenced.has_in_scope("select", Scope::Select));
    }

    #[test]
    fn foreign_boundaries_are_namespace_qualified() {
        let mut stack = OpenElementStack::new();
        stack.push(0u32, "html", Namespace::Html);
        stack.push(1, "p", Namespace::Html);
        stack.push(2, "title", Namespace::Svg);
        stack.push(3, "tspan", Namespace::Svg);
        // svg <title> is a scope boundary; an html <title> would not be.
        assert!(!stack.has_in_scope("p", Scope::Default));
    }

    #[test]
    fn numbered_header_scope_requires_html_namespace() {
        let mut stack = OpenElementStack::new();
        stack.push(0u32, "html", Namespace::Html);
        stack.push(1, "h1", Namespace::Svg);
        assert!(!stack.has_numbered_header_in_scope());
        stack.push(2, "h2", Namespace::Html);
        assert!(stack.has_numbered_header_in_scope());

        stack.pop_until_numbered_header_popped();
        // Only the html h2 qualifies as the popped header; the svg h1 stays
        // until popped as an ordinary entry.
        assert_eq!(stack.current().map(|entry| entry.name.as_str()), Some("h1"));
    }

    #[test]
    fn implied_end_tags_respect_exclusion() {
        let mut stack = stack_of(&["html", "body", "div", "li", "p"]);
        stack.generate_implied_end_tags(Some("li"));
        assert_eq!(stack.current().map(|entry| entry.name.as_str()), Some("li"));
        stack.generate_implied_end_tags(None);
        assert_eq!(stack.current().map(|entry| entry.name.as_str()), Some("div"));
    }

    #[test]
    fn template_count_tracks_push_pop_and_remove() {
        let mut stack = stack_of(&["html", "template", "div"]);
        assert!(stack.has_template());
        stack.pop_until_tag_name_popped("template");
        assert!(!stack.has_template());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn insert_after_and_replace_keep_positions() {
        let mut stack = stack_of(&["html", "b", "div"]);
        stack.insert_after(2, 9u32, "i", Namespace::Html);
        assert_eq!(stack.index_of(9), Some(3));
        stack.replace(1, 7, "em", Namespace::Html);
        assert_eq!(stack.get(1).map(|entry| entry.name.as_str()), Some("em"));
        assert_eq!(stack.common_ancestor(7), Some(0));
    }
}
