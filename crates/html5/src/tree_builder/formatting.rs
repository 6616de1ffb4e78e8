//! List of active formatting elements.
//!
//! Entries pair an element with the start-tag token that created it so the
//! element can be re-created during reconstruction and the adoption agency.
//! Markers bound reconstruction across applet/object/marquee/template and
//! table-cell/caption boundaries.
//!
//! Invariant (Noah's Ark): between the list end and the nearest marker, at
//! most three entries share an identical (tag name, namespace, attribute set);
//! pushing a fourth evicts the oldest.

use crate::tags;
use crate::token::TagToken;

const NOAHS_ARK_CAPACITY: usize = 3;

#[derive(Clone, Debug)]
pub(crate) enum FormattingEntry<H> {
    Marker,
    Element { element: H, token: TagToken },
}

#[derive(Debug)]
pub(crate) struct FormattingElementList<H> {
    entries: Vec<FormattingEntry<H>>,
}

impl<H: Copy + Eq> FormattingElementList<H> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&FormattingEntry<H>> {
        self.entries.get(index)
    }

    pub(crate) fn insert_marker(&mut self) {
        self.entries.push(FormattingEntry::Marker);
    }

    /// Push an element entry, enforcing the Noah's Ark condition first.
    pub(crate) fn push(&mut self, element: H, token: TagToken) {
        debug_assert!(
            tags::is_formatting(&token.name),
            "only formatting elements enter the active list"
        );
        let mut candidates = Vec::new();
        for (index, entry) in self.entries.iter().enumerate().rev() {
            match entry {
                FormattingEntry::Marker => break,
                FormattingEntry::Element { token: other, .. } => {
                    if other.name == token.name
                        && other.attrs.len() == token.attrs.len()
                        && token.attrs.iter().all(|attr| {
                            other
                                .attrs
                                .iter()
                                .any(|o| o.name == attr.name && o.value == attr.value)
                        })
                    {
                        candidates.push(index);
                    }
                }
            }
        }
        if candidates.len() >= NOAHS_ARK_CAPACITY {
            // Candidates are collected newest-first, so the oldest sit at the
            // tail. Evict until capacity - 1 survive, then push the new entry.
            let excess = candidates.len() - (NOAHS_ARK_CAPACITY - 1);
            // Descending index order keeps the remaining removals valid.
            for &index in candidates.iter().skip(candidates.len() - excess) {
                let _ = self.entries.remove(index);
            }
        }
        self.entries.push(FormattingEntry::Element { element, token });
    }

    /// Last element entry with `name` between the list end and the nearest
    /// marker. Returns the entry index.
    pub(crate) fn entry_in_scope_with_tag_name(&self, name: &str) -> Option<usize> {
        for (index, entry) in self.entries.iter().enumerate().rev() {
            match entry {
                FormattingEntry::Marker => return None,
                FormattingEntry::Element { token, .. } => {
                    if token.name == name {
                        return Some(index);
                    }
                }
            }
        }
        None
    }

    pub(crate) fn entry_index_for_element(&self, element: H) -> Option<usize> {
        self.entries.iter().rposition(|entry| {
            matches!(entry, FormattingEntry::Element { element: e, .. } if *e == element)
        })
    }

    pub(crate) fn remove_at(&mut self, index: usize) {
        let _ = self.entries.remove(index);
    }

    pub(crate) fn remove_element(&mut self, element: H) {
        if let Some(index) = self.entry_index_for_element(element) {
            self.remove_at(index);
        }
    }

    pub(crate) fn insert_at(&mut self, index: usize, element: H, token: TagToken) {
        self.entries
            .insert(index, FormattingEntry::Element { element, token });
    }

    /// Replace the element of the entry at `index`, keeping its token.
    pub(crate) fn replace_element_at(&mut self, index: usize, element: H) {
        if let Some(FormattingEntry::Element { element: slot, .. }) = self.entries.get_mut(index) {
            *slot = element;
        }
    }

    /// Pop entries down to and including the nearest marker.
    pub(crate) fn clear_to_last_marker(&mut self) {
        while let Some(entry) = self.entries.pop() {
            if matches!(entry, FormattingEntry::Marker) {
                break;
            }
        }
    }
}
