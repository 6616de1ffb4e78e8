//! Tree-construction parser.
//!
//! Consumes tokens and drives the stack of open elements and the active
//! formatting list, mutating the document through the `TreeSink` capability.
//! The builder owns all construction state (insertion modes, template mode
//! stack, parent lookup, pending table text, flags) and is resumable across
//! token boundaries.
//!
//! Dispatch is a closed match over `(InsertionMode, Token)`; a foreign-content
//! pre-check intercepts tokens while the adjusted current node is outside the
//! HTML namespace and not at an integration point.

use std::collections::HashMap;

use crate::doctype;
use crate::error::{ParseError, ParseErrorCode};
use crate::sink::{DocumentMode, EngineInvariantError, Namespace, TreeSink};
use crate::tags;
use crate::token::{CharacterKind, TagToken, Token};
use crate::tokenizer::{Tokenizer, TokenizerState};
use crate::ParserConfig;

pub(crate) mod foreign;
mod formatting;
mod modes;
mod stack;

use formatting::{FormattingElementList, FormattingEntry};
use modes::InsertionMode;
use stack::{OpenElementStack, Scope};

/// Resolved insertion location.
enum InsertPos<H> {
    Append(H),
    Before(H, H),
}

struct FragmentContext<H> {
    element: H,
    name: String,
    ns: Namespace,
}

pub(crate) struct TreeBuilder<S: TreeSink> {
    sink: S,
    config: ParserConfig,
    document: S::Handle,
    mode: InsertionMode,
    original_mode: InsertionMode,
    template_modes: Vec<InsertionMode>,
    open: OpenElementStack<S::Handle>,
    formatting: FormattingElementList<S::Handle>,
    /// Child -> parent lookup owned by the parser; the sink does not
    /// guarantee parent back-links.
    parents: HashMap<S::Handle, S::Handle>,
    head: Option<S::Handle>,
    form: Option<S::Handle>,
    fragment_ctx: Option<FragmentContext<S::Handle>>,
    doc_mode: DocumentMode,
    frameset_ok: bool,
    foster_parenting: bool,
    pending_table_text: Vec<(CharacterKind, String)>,
    skip_next_newline: bool,
    ack_self_closing: bool,
    stopped: bool,
    position: usize,
    errors: Vec<ParseError>,
}

impl<S: TreeSink> TreeBuilder<S> {
    pub(crate) fn new(mut sink: S, config: ParserConfig) -> Self {
        let document = sink.create_document();
        Self {
            sink,
            config,
            document,
            mode: InsertionMode::Initial,
            original_mode: InsertionMode::Initial,
            template_modes: Vec::new(),
            open: OpenElementStack::new(),
            formatting: FormattingElementList::new(),
            parents: HashMap::new(),
            head: None,
            form: None,
            fragment_ctx: None,
            doc_mode: DocumentMode::NoQuirks,
            frameset_ok: true,
            foster_parenting: false,
            pending_table_text: Vec::new(),
            skip_next_newline: false,
            ack_self_closing: false,
            stopped: false,
            position: 0,
            errors: Vec::new(),
        }
    }

    /// Fragment-parsing setup: synthetic root, context-derived insertion mode,
    /// and a seeded template-mode stack for `<template>` contexts.
    pub(crate) fn new_fragment(sink: S, config: ParserConfig, context: S::Handle) -> Self {
        let mut builder = Self::new(sink, config);
        let ctx_name = {
            let elem = builder.sink.element_name(context);
            (elem.name.to_string(), elem.ns)
        };
        let root = builder.sink.create_element("html", Namespace::Html, Vec::new());
        builder.sink.append_child(builder.document, root);
        builder.parents.insert(root, builder.document);
        builder.open.push(root, "html", Namespace::Html);
        if ctx_name.1 == Namespace::Html && ctx_name.0 == "template" {
            builder.template_modes.push(InsertionMode::InTemplate);
        }
        if ctx_name.1 == Namespace::Html && ctx_name.0 == "form" {
            builder.form = Some(context);
        }
        builder.fragment_ctx = Some(FragmentContext {
            element: context,
            name: ctx_name.0,
            ns: ctx_name.1,
        });
        builder.reset_insertion_mode();
        builder
    }

    pub(crate) fn document(&self) -> S::Handle {
        self.document
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    pub(crate) fn into_sink(self) -> S {
        self.sink
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub(crate) fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    pub(crate) fn fragment_context_name(&self) -> Option<(&str, Namespace)> {
        self.fragment_ctx
            .as_ref()
            .map(|ctx| (ctx.name.as_str(), ctx.ns))
    }

    /// Collect the parsed fragment: the synthetic root's children move into a
    /// fresh document fragment.
    pub(crate) fn finish_fragment(&mut self) -> Result<S::Handle, EngineInvariantError> {
        let root = self.open.get(0).ok_or(EngineInvariantError)?.element;
        let fragment = self.sink.create_document_fragment();
        self.adopt_children(root, fragment);
        Ok(fragment)
    }

    fn err(&mut self, code: ParseErrorCode) {
        self.errors.push(ParseError {
            code,
            position: self.position,
        });
    }

    // ---- token pump ------------------------------------------------------

    pub(crate) fn process_token(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<(), EngineInvariantError> {
        if self.stopped {
            return Ok(());
        }
        let mut current = Some(token);
        while let Some(mut token) = current.take() {
            if self.skip_next_newline {
                self.skip_next_newline = false;
                if let Token::Characters { kind, text } = &token {
                    if let Some(rest) = text.strip_prefix('\n') {
                        if rest.is_empty() {
                            break;
                        }
                        token = Token::Characters {
                            kind: *kind,
                            text: rest.to_string(),
                        };
                    }
                }
            }
            let self_closing_start =
                matches!(&token, Token::StartTag(tag) if tag.self_closing);
            self.ack_self_closing = false;
            #[cfg(any(test, feature = "debug-stats"))]
            log::trace!(target: "html5.tree_builder", "mode {:?} token {:?}", self.mode, token);
            current = if self.should_process_in_foreign_content(&token) {
                self.process_in_foreign_content(token, tokenizer)?
            } else {
                self.dispatch(token, tokenizer)?
            };
            if self_closing_start && current.is_none() && !self.ack_self_closing {
                self.err(ParseErrorCode::NonVoidHtmlElementStartTagWithTrailingSolidus);
            }
            if self.stopped {
                break;
            }
        }
        self.update_tokenizer_context(tokenizer);
        Ok(())
    }

    fn update_tokenizer_context(&self, tokenizer: &mut Tokenizer) {
        let allow_cdata = match self.adjusted_current_node() {
            Some((name, ns, element)) => {
                ns != Namespace::Html && !self.is_integration_point(&name, ns, element)
            }
            None => false,
        };
        tokenizer.set_allow_cdata(allow_cdata);
    }

    fn dispatch(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match self.mode {
            InsertionMode::Initial => self.handle_initial(token),
            InsertionMode::BeforeHtml => self.handle_before_html(token),
            InsertionMode::BeforeHead => self.handle_before_head(token, tokenizer),
            InsertionMode::InHead => self.handle_in_head(token, tokenizer),
            InsertionMode::InHeadNoscript => self.handle_in_head_noscript(token, tokenizer),
            InsertionMode::AfterHead => self.handle_after_head(token, tokenizer),
            InsertionMode::InBody => self.handle_in_body(token, tokenizer),
            InsertionMode::Text => self.handle_text(token),
            InsertionMode::InTable => self.handle_in_table(token, tokenizer),
            InsertionMode::InTableText => self.handle_in_table_text(token, tokenizer),
            InsertionMode::InCaption => self.handle_in_caption(token, tokenizer),
            InsertionMode::InColumnGroup => self.handle_in_column_group(token, tokenizer),
            InsertionMode::InTableBody => self.handle_in_table_body(token, tokenizer),
            InsertionMode::InRow => self.handle_in_row(token, tokenizer),
            InsertionMode::InCell => self.handle_in_cell(token, tokenizer),
            InsertionMode::InSelect => self.handle_in_select(token, tokenizer),
            InsertionMode::InSelectInTable => self.handle_in_select_in_table(token, tokenizer),
            InsertionMode::InTemplate => self.handle_in_template(token, tokenizer),
            InsertionMode::AfterBody => self.handle_after_body(token, tokenizer),
            InsertionMode::InFrameset => self.handle_in_frameset(token, tokenizer),
            InsertionMode::AfterFrameset => self.handle_after_frameset(token, tokenizer),
            InsertionMode::AfterAfterBody => self.handle_after_after_body(token, tokenizer),
            InsertionMode::AfterAfterFrameset => self.handle_after_after_frameset(token, tokenizer),
        }
    }

    // ---- shared machinery ------------------------------------------------

    fn current_element(&self) -> Result<S::Handle, EngineInvariantError> {
        self.open
            .current()
            .map(|entry| entry.element)
            .ok_or(EngineInvariantError)
    }

    fn current_is(&self, name: &str) -> bool {
        self.open.current().is_some_and(|entry| entry.is_html(name))
    }

    fn attach(&mut self, parent: S::Handle, child: S::Handle) {
        self.sink.append_child(parent, child);
        self.parents.insert(child, parent);
    }

    fn detach(&mut self, node: S::Handle) {
        self.sink.detach_node(node);
        self.parents.remove(&node);
    }

    /// Move every child of `from` under `to` (adoption agency, fragment
    /// collection, frameset teardown).
    fn adopt_children(&mut self, from: S::Handle, to: S::Handle) {
        while let Some(child) = self.sink.first_child(from) {
            self.sink.detach_node(child);
            self.parents.remove(&child);
            self.attach(to, child);
        }
    }

    /// The appropriate place for inserting a node, honoring foster parenting
    /// and template-content redirection.
    fn insertion_place(
        &mut self,
        override_target: Option<S::Handle>,
    ) -> Result<InsertPos<S::Handle>, EngineInvariantError> {
        let target = match override_target {
            Some(target) => target,
            None => self.current_element()?,
        };
        let elem = self.sink.element_name(target);
        let (name, ns) = (elem.name.to_string(), elem.ns);
        if self.foster_parenting && ns == Namespace::Html && tags::is_table_foster_target(&name) {
            return self.foster_place();
        }
        if ns == Namespace::Html && name == "template" {
            let content = self
                .sink
                .template_content(target)
                .ok_or(EngineInvariantError)?;
            return Ok(InsertPos::Append(content));
        }
        Ok(InsertPos::Append(target))
    }

    /// Walk the open-element stack from the top for a template (content) or
    /// table (before it, or into its parent) insertion target.
    fn foster_place(&mut self) -> Result<InsertPos<S::Handle>, EngineInvariantError> {
        for index in (0..self.open.len()).rev() {
            let entry = self.open.get(index).ok_or(EngineInvariantError)?;
            let (element, is_template, is_table) = (
                entry.element,
                entry.is_html("template"),
                entry.is_html("table"),
            );
            if is_template {
                let content = self
                    .sink
                    .template_content(element)
                    .ok_or(EngineInvariantError)?;
                return Ok(InsertPos::Append(content));
            }
            if is_table {
                if let Some(parent) = self.parents.get(&element).copied() {
                    return Ok(InsertPos::Before(parent, element));
                }
                let below = index
                    .checked_sub(1)
                    .and_then(|i| self.open.get(i))
                    .ok_or(EngineInvariantError)?;
                return Ok(InsertPos::Append(below.element));
            }
        }
        let root = self.open.get(0).ok_or(EngineInvariantError)?;
        Ok(InsertPos::Append(root.element))
    }

    fn insert_at(&mut self, place: InsertPos<S::Handle>, node: S::Handle) {
        match place {
            InsertPos::Append(parent) => self.attach(parent, node),
            InsertPos::Before(parent, reference) => {
                self.sink.insert_before(parent, node, reference);
                self.parents.insert(node, parent);
            }
        }
    }

    fn insert_characters(&mut self, text: &str) -> Result<(), EngineInvariantError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.insertion_place(None)? {
            InsertPos::Append(parent) => self.sink.insert_text(parent, text),
            InsertPos::Before(parent, reference) => {
                self.sink.insert_text_before(parent, text, reference)
            }
        }
        Ok(())
    }

    fn insert_comment(&mut self, text: &str) -> Result<(), EngineInvariantError> {
        let comment = self.sink.create_comment(text);
        let place = self.insertion_place(None)?;
        self.insert_at(place, comment);
        Ok(())
    }

    fn insert_comment_into(&mut self, parent: S::Handle, text: &str) {
        let comment = self.sink.create_comment(text);
        self.attach(parent, comment);
    }

    /// Create an element for a token; `<template>` elements get their content
    /// fragment wired up immediately.
    fn create_element_for_token(&mut self, token: &TagToken, ns: Namespace) -> S::Handle {
        let element = self
            .sink
            .create_element(&token.name, ns, token.attrs.clone());
        if ns == Namespace::Html && token.name == "template" {
            let content = self.sink.create_document_fragment();
            self.sink.set_template_content(element, content);
        }
        element
    }

    fn insert_html_element(
        &mut self,
        token: &TagToken,
    ) -> Result<S::Handle, EngineInvariantError> {
        let element = self.create_element_for_token(token, Namespace::Html);
        let place = self.insertion_place(None)?;
        self.insert_at(place, element);
        self.open.push(element, token.name.clone(), Namespace::Html);
        Ok(element)
    }

    fn insert_phantom(&mut self, name: &str) -> Result<S::Handle, EngineInvariantError> {
        self.insert_html_element(&TagToken::new(name))
    }

    fn insert_foreign_element(
        &mut self,
        token: &TagToken,
        ns: Namespace,
    ) -> Result<S::Handle, EngineInvariantError> {
        let element = self.create_element_for_token(token, ns);
        let place = self.insertion_place(None)?;
        self.insert_at(place, element);
        self.open.push(element, token.name.clone(), ns);
        Ok(element)
    }

    fn ack(&mut self) {
        self.ack_self_closing = true;
    }

    fn set_document_mode(&mut self, mode: DocumentMode) {
        self.doc_mode = mode;
        self.sink.set_document_mode(self.document, mode);
    }

    /// Switch the tokenizer into RAWTEXT/RCDATA for the current element and
    /// park the insertion mode in `Text`.
    fn generic_raw_text(
        &mut self,
        token: &TagToken,
        tokenizer: &mut Tokenizer,
        state: TokenizerState,
    ) -> Result<(), EngineInvariantError> {
        self.insert_html_element(token)?;
        tokenizer.set_state(state);
        self.original_mode = self.mode;
        self.mode = InsertionMode::Text;
        Ok(())
    }

    fn close_p_element(&mut self) {
        self.open.generate_implied_end_tags(Some("p"));
        if !self.current_is("p") {
            self.err(ParseErrorCode::UnexpectedEndTag);
        }
        self.open.pop_until_tag_name_popped("p");
    }

    fn close_table_cell(&mut self) {
        self.open.generate_implied_end_tags(None);
        if !self.current_is("td") && !self.current_is("th") {
            self.err(ParseErrorCode::UnexpectedEndTag);
        }
        self.open.pop_until_table_cell_popped();
        self.formatting.clear_to_last_marker();
        self.mode = InsertionMode::InRow;
    }

    fn stop_parsing(&mut self) {
        self.stopped = true;
    }

    /// Re-open formatting elements implicitly closed by an intervening block.
    fn reconstruct_active_formatting_elements(&mut self) -> Result<(), EngineInvariantError> {
        let len = self.formatting.len();
        if len == 0 {
            return Ok(());
        }
        let entry_is_settled = |builder: &Self, index: usize| match builder.formatting.get(index) {
            Some(FormattingEntry::Marker) | None => true,
            Some(FormattingEntry::Element { element, .. }) => builder.open.contains(*element),
        };
        if entry_is_settled(self, len - 1) {
            return Ok(());
        }
        let mut index = len - 1;
        while index > 0 && !entry_is_settled(self, index - 1) {
            index -= 1;
        }
        for i in index..len {
            let token = match self.formatting.get(i) {
                Some(FormattingEntry::Element { token, .. }) => token.clone(),
                _ => continue,
            };
            let element = self.insert_html_element(&token)?;
            self.formatting.replace_element_at(i, element);
        }
        Ok(())
    }

    fn reset_insertion_mode(&mut self) {
        for index in (0..self.open.len()).rev() {
            let last = index == 0;
            let entry = self.open.get(index).expect("index in range");
            let (mut name, mut ns) = (entry.name.clone(), entry.ns);
            if last {
                if let Some(ctx) = &self.fragment_ctx {
                    name = ctx.name.clone();
                    ns = ctx.ns;
                }
            }
            if ns != Namespace::Html {
                if last {
                    self.mode = InsertionMode::InBody;
                    return;
                }
                continue;
            }
            match name.as_str() {
                "select" => {
                    self.mode = InsertionMode::InSelect;
                    if !last {
                        for j in (0..index).rev() {
                            let ancestor = self.open.get(j).expect("index in range");
                            if ancestor.is_html("template") {
                                break;
                            }
                            if ancestor.is_html("table") {
                                self.mode = InsertionMode::InSelectInTable;
                                break;
                            }
                        }
                    }
                    return;
                }
                "td" | "th" if !last => {
                    self.mode = InsertionMode::InCell;
                    return;
                }
                "tr" => {
                    self.mode = InsertionMode::InRow;
                    return;
                }
                "tbody" | "thead" | "tfoot" => {
                    self.mode = InsertionMode::InTableBody;
                    return;
                }
                "caption" => {
                    self.mode = InsertionMode::InCaption;
                    return;
                }
                "colgroup" => {
                    self.mode = InsertionMode::InColumnGroup;
                    return;
                }
                "table" => {
                    self.mode = InsertionMode::InTable;
                    return;
                }
                "template" => {
                    self.mode = self
                        .template_modes
                        .last()
                        .copied()
                        .unwrap_or(InsertionMode::InTemplate);
                    return;
                }
                "head" if !last => {
                    self.mode = InsertionMode::InHead;
                    return;
                }
                "body" => {
                    self.mode = InsertionMode::InBody;
                    return;
                }
                "frameset" => {
                    self.mode = InsertionMode::InFrameset;
                    return;
                }
                "html" => {
                    self.mode = if self.head.is_none() {
                        InsertionMode::BeforeHead
                    } else {
                        InsertionMode::AfterHead
                    };
                    return;
                }
                _ if last => {
                    self.mode = InsertionMode::InBody;
                    return;
                }
                _ => {}
            }
        }
        self.mode = InsertionMode::InBody;
    }

    // ---- foreign content -------------------------------------------------

    fn adjusted_current_node(&self) -> Option<(String, Namespace, S::Handle)> {
        if self.open.is_empty() {
            return None;
        }
        if self.open.len() == 1 {
            if let Some(ctx) = &self.fragment_ctx {
                return Some((ctx.name.clone(), ctx.ns, ctx.element));
            }
        }
        self.open
            .current()
            .map(|entry| (entry.name.clone(), entry.ns, entry.element))
    }

    fn element_encoding_attr(&self, element: S::Handle) -> Option<String> {
        self.sink
            .element_attributes(element)
            .iter()
            .find(|attr| attr.name == "encoding")
            .map(|attr| attr.value.clone())
    }

    fn is_integration_point(&self, name: &str, ns: Namespace, element: S::Handle) -> bool {
        if foreign::is_mathml_text_integration_point(name, ns) {
            return true;
        }
        let encoding = self.element_encoding_attr(element);
        foreign::is_html_integration_point(name, ns, encoding.as_deref())
    }

    fn should_process_in_foreign_content(&self, token: &Token) -> bool {
        let Some((name, ns, element)) = self.adjusted_current_node() else {
            return false;
        };
        if ns == Namespace::Html {
            return false;
        }
        if matches!(token, Token::Eof) {
            return false;
        }
        if foreign::is_mathml_text_integration_point(&name, ns) {
            match token {
                Token::StartTag(tag) if tag.name != "mglyph" && tag.name != "malignmark" => {
                    return false;
                }
                Token::Characters { .. } => return false,
                _ => {}
            }
        }
        if ns == Namespace::MathMl && name == "annotation-xml" {
            if let Token::StartTag(tag) = token {
                if tag.name == "svg" {
                    return false;
                }
            }
        }
        let encoding = self.element_encoding_attr(element);
        if foreign::is_html_integration_point(&name, ns, encoding.as_deref())
            && matches!(token, Token::StartTag(_) | Token::Characters { .. })
        {
            return false;
        }
        true
    }

    fn process_in_foreign_content(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Null,
                text,
            } => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                let replaced: String = text.chars().map(|_| '\u{FFFD}').collect();
                self.insert_characters(&replaced)?;
            }
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => self.insert_characters(&text)?,
            Token::Characters { text, .. } => {
                self.frameset_ok = false;
                self.insert_characters(&text)?;
            }
            Token::Comment(text) => self.insert_comment(&text)?,
            Token::Doctype(_) => self.err(ParseErrorCode::MisplacedDoctype),
            Token::StartTag(mut tag) => {
                if foreign::is_breakout_tag(&tag) {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    loop {
                        let Some(entry) = self.open.current() else {
                            break;
                        };
                        if entry.ns == Namespace::Html {
                            break;
                        }
                        let (name, ns, element) = (entry.name.clone(), entry.ns, entry.element);
                        if foreign::is_mathml_text_integration_point(&name, ns)
                            || self.is_integration_point(&name, ns, element)
                        {
                            break;
                        }
                        let _ = self.open.pop();
                    }
                    return Ok(Some(Token::StartTag(tag)));
                }
                let ns = self
                    .adjusted_current_node()
                    .map(|(_, ns, _)| ns)
                    .ok_or(EngineInvariantError)?;
                if ns == Namespace::MathMl {
                    foreign::adjust_mathml_attributes(&mut tag);
                } else if ns == Namespace::Svg {
                    foreign::adjust_svg_tag_name(&mut tag);
                    foreign::adjust_svg_attributes(&mut tag);
                }
                foreign::adjust_foreign_attributes(&mut tag);
                self.insert_foreign_element(&tag, ns)?;
                if tag.self_closing {
                    let _ = self.open.pop();
                    self.ack();
                }
            }
            Token::EndTag(tag) => {
                let current_matches = self
                    .open
                    .current()
                    .is_some_and(|entry| entry.name.to_ascii_lowercase() == tag.name);
                if !current_matches {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                let mut index = self.open.len().saturating_sub(1);
                loop {
                    if index == 0 {
                        break;
                    }
                    let (name, element) = {
                        let entry = self.open.get(index).ok_or(EngineInvariantError)?;
                        (entry.name.to_ascii_lowercase(), entry.element)
                    };
                    if name == tag.name {
                        self.open.pop_until_element_popped(element);
                        break;
                    }
                    index -= 1;
                    let below_is_html = self
                        .open
                        .get(index)
                        .is_some_and(|entry| entry.ns == Namespace::Html);
                    if below_is_html {
                        return self.dispatch(Token::EndTag(tag), tokenizer);
                    }
                }
            }
            Token::Eof | Token::Hibernation => {}
        }
        Ok(None)
    }

    // ---- adoption agency -------------------------------------------------

    fn any_other_end_tag_in_body(&mut self, name: &str) {
        for index in (0..self.open.len()).rev() {
            let (entry_name, entry_ns, element) = {
                let entry = match self.open.get(index) {
                    Some(entry) => entry,
                    None => return,
                };
                (entry.name.clone(), entry.ns, entry.element)
            };
            if entry_ns == Namespace::Html && entry_name == name {
                self.open.generate_implied_end_tags(Some(name));
                if self.current_element().ok() != Some(element) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_element_popped(element);
                return;
            }
            if tags::is_special(&entry_name, entry_ns) {
                self.err(ParseErrorCode::UnexpectedEndTag);
                return;
            }
        }
    }

    /// The adoption agency algorithm: reconcile a misnested formatting end tag
    /// with intervening blocks by cloning and relocating the formatting
    /// element. Up to eight outer iterations; the inner loop allows three
    /// bookkeeping passes before forcing removal.
    fn adoption_agency(&mut self, subject: &str) -> Result<(), EngineInvariantError> {
        for _ in 0..8 {
            let current = self
                .open
                .current()
                .map(|entry| (entry.element, entry.is_html(subject)));
            if let Some((element, is_subject)) = current {
                if is_subject && self.formatting.entry_index_for_element(element).is_none() {
                    let _ = self.open.pop();
                    return Ok(());
                }
            }
            let Some(fmt_index) = self.formatting.entry_in_scope_with_tag_name(subject) else {
                self.any_other_end_tag_in_body(subject);
                return Ok(());
            };
            let (fmt_element, fmt_token) = match self.formatting.get(fmt_index) {
                Some(FormattingEntry::Element { element, token }) => (*element, token.clone()),
                _ => return Err(EngineInvariantError),
            };
            if !self.open.contains(fmt_element) {
                self.err(ParseErrorCode::UnexpectedEndTag);
                self.formatting.remove_at(fmt_index);
                return Ok(());
            }
            if !self.open.has_element_in_scope(fmt_element) {
                self.err(ParseErrorCode::UnexpectedEndTag);
                return Ok(());
            }
            if self.current_element()? != fmt_element {
                self.err(ParseErrorCode::UnexpectedEndTag);
            }

            let fmt_stack_index = self.open.index_of(fmt_element).ok_or(EngineInvariantError)?;
            let mut furthest: Option<(usize, S::Handle)> = None;
            for index in (fmt_stack_index + 1)..self.open.len() {
                let entry = self.open.get(index).ok_or(EngineInvariantError)?;
                if tags::is_special(&entry.name, entry.ns) {
                    furthest = Some((index, entry.element));
                    break;
                }
            }
            let Some((furthest_index, furthest_block)) = furthest else {
                self.open.pop_until_element_popped(fmt_element);
                self.formatting.remove_at(fmt_index);
                return Ok(());
            };
            let common_ancestor = self
                .open
                .common_ancestor(fmt_element)
                .ok_or(EngineInvariantError)?;

            let mut bookmark = fmt_index;
            let mut node_index = furthest_index;
            let mut last_node = furthest_block;
            let mut inner = 0u32;
            loop {
                inner += 1;
                node_index -= 1;
                let (mut node, node_name) = {
                    let entry = self.open.get(node_index).ok_or(EngineInvariantError)?;
                    (entry.element, entry.name.clone())
                };
                if node == fmt_element {
                    break;
                }
                let mut node_fmt_index = self.formatting.entry_index_for_element(node);
                if inner > 3 {
                    if let Some(index) = node_fmt_index.take() {
                        self.formatting.remove_at(index);
                        if bookmark > index {
                            bookmark -= 1;
                        }
                    }
                }
                let Some(node_fmt) = node_fmt_index else {
                    self.open.remove(node);
                    continue;
                };
                let node_token = match self.formatting.get(node_fmt) {
                    Some(FormattingEntry::Element { token, .. }) => token.clone(),
                    _ => return Err(EngineInvariantError),
                };
                let replacement = self.create_element_for_token(&node_token, Namespace::Html);
                self.formatting.replace_element_at(node_fmt, replacement);
                self.open
                    .replace(node, replacement, node_name, Namespace::Html);
                node = replacement;
                if last_node == furthest_block {
                    bookmark = node_fmt + 1;
                }
                self.detach(last_node);
                self.attach(node, last_node);
                last_node = node;
            }

            self.detach(last_node);
            let ancestor_name = self.sink.element_name(common_ancestor);
            let foster_common = ancestor_name.ns == Namespace::Html
                && tags::is_table_foster_target(ancestor_name.name);
            if foster_common {
                let place = self.foster_place()?;
                self.insert_at(place, last_node);
            } else {
                let place = self.insertion_place(Some(common_ancestor))?;
                self.insert_at(place, last_node);
            }

            let new_fmt = self.create_element_for_token(&fmt_token, Namespace::Html);
            self.adopt_children(furthest_block, new_fmt);
            self.attach(furthest_block, new_fmt);

            if let Some(index) = self.formatting.entry_index_for_element(fmt_element) {
                self.formatting.remove_at(index);
                if bookmark > index {
                    bookmark -= 1;
                }
            }
            let bookmark = bookmark.min(self.formatting.len());
            self.formatting.insert_at(bookmark, new_fmt, fmt_token.clone());

            self.open.remove(fmt_element);
            self.open.insert_after(
                furthest_block,
                new_fmt,
                fmt_token.name.clone(),
                Namespace::Html,
            );
        }
        Ok(())
    }

    // ---- mode handlers ---------------------------------------------------

    fn handle_initial(&mut self, token: Token) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            } => Ok(None),
            Token::Comment(text) => {
                self.insert_comment_into(self.document, &text);
                Ok(None)
            }
            Token::Doctype(doctype) => {
                let name_ok = doctype.name.as_deref() == Some("html");
                let system_ok = doctype.system_id.is_none()
                    || doctype.system_id.as_deref() == Some("about:legacy-compat");
                if !name_ok || doctype.public_id.is_some() || !system_ok {
                    self.err(ParseErrorCode::UnexpectedToken);
                }
                self.sink.set_document_type(
                    self.document,
                    doctype.name.as_deref().unwrap_or(""),
                    doctype.public_id.as_deref().unwrap_or(""),
                    doctype.system_id.as_deref().unwrap_or(""),
                );
                if self.fragment_ctx.is_none() {
                    let mode = doctype::document_mode(&doctype);
                    self.set_document_mode(mode);
                }
                self.mode = InsertionMode::BeforeHtml;
                Ok(None)
            }
            token => {
                if self.fragment_ctx.is_none() {
                    self.err(ParseErrorCode::MissingDoctype);
                    self.set_document_mode(DocumentMode::Quirks);
                }
                self.mode = InsertionMode::BeforeHtml;
                Ok(Some(token))
            }
        }
    }

    fn handle_before_html(&mut self, token: Token) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment_into(self.document, &text);
                Ok(None)
            }
            Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            } => Ok(None),
            Token::StartTag(tag) if tag.name == "html" => {
                let element = self.create_element_for_token(&tag, Namespace::Html);
                self.attach(self.document, element);
                self.open.push(element, "html", Namespace::Html);
                self.mode = InsertionMode::BeforeHead;
                Ok(None)
            }
            Token::EndTag(tag) if !matches!(tag.name.as_str(), "head" | "body" | "html" | "br") => {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            token => {
                let element = self.sink.create_element("html", Namespace::Html, Vec::new());
                self.attach(self.document, element);
                self.open.push(element, "html", Namespace::Html);
                self.mode = InsertionMode::BeforeHead;
                Ok(Some(token))
            }
        }
    }

    fn handle_before_head(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            } => Ok(None),
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::StartTag(tag) if tag.name == "head" => {
                let head = self.insert_html_element(&tag)?;
                self.head = Some(head);
                self.mode = InsertionMode::InHead;
                Ok(None)
            }
            Token::EndTag(tag) if !matches!(tag.name.as_str(), "head" | "body" | "html" | "br") => {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            token => {
                let head = self.insert_phantom("head")?;
                self.head = Some(head);
                self.mode = InsertionMode::InHead;
                Ok(Some(token))
            }
        }
    }

    fn handle_in_head(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) => match tag.name.clone().as_str() {
                "html" => self.handle_in_body(Token::StartTag(tag), tokenizer),
                "base" | "basefont" | "bgsound" | "link" | "meta" => {
                    self.insert_html_element(&tag)?;
                    let _ = self.open.pop();
                    self.ack();
                    Ok(None)
                }
                "title" => {
                    self.generic_raw_text(&tag, tokenizer, TokenizerState::Rcdata)?;
                    Ok(None)
                }
                "noscript" if self.config.scripting_enabled => {
                    self.generic_raw_text(&tag, tokenizer, TokenizerState::Rawtext)?;
                    Ok(None)
                }
                "noscript" => {
                    self.insert_html_element(&tag)?;
                    self.mode = InsertionMode::InHeadNoscript;
                    Ok(None)
                }
                "noframes" | "style" => {
                    self.generic_raw_text(&tag, tokenizer, TokenizerState::Rawtext)?;
                    Ok(None)
                }
                "script" => {
                    self.generic_raw_text(&tag, tokenizer, TokenizerState::ScriptData)?;
                    Ok(None)
                }
                "template" => {
                    self.insert_html_element(&tag)?;
                    self.formatting.insert_marker();
                    self.frameset_ok = false;
                    self.mode = InsertionMode::InTemplate;
                    self.template_modes.push(InsertionMode::InTemplate);
                    Ok(None)
                }
                "head" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    Ok(None)
                }
                _ => {
                    let _ = self.open.pop();
                    self.mode = InsertionMode::AfterHead;
                    Ok(Some(Token::StartTag(tag)))
                }
            },
            Token::EndTag(tag) => match tag.name.clone().as_str() {
                "head" => {
                    let _ = self.open.pop();
                    self.mode = InsertionMode::AfterHead;
                    Ok(None)
                }
                "template" => {
                    self.close_template();
                    Ok(None)
                }
                "body" | "html" | "br" => {
                    let _ = self.open.pop();
                    self.mode = InsertionMode::AfterHead;
                    Ok(Some(Token::EndTag(tag)))
                }
                _ => {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    Ok(None)
                }
            },
            token => {
                let _ = self.open.pop();
                self.mode = InsertionMode::AfterHead;
                Ok(Some(token))
            }
        }
    }

    fn close_template(&mut self) {
        if !self.open.has_template() {
            self.err(ParseErrorCode::UnexpectedEndTag);
            return;
        }
        self.open.generate_implied_end_tags_thoroughly();
        if !self.current_is("template") {
            self.err(ParseErrorCode::UnexpectedEndTag);
        }
        self.open.pop_until_tag_name_popped("template");
        self.formatting.clear_to_last_marker();
        let _ = self.template_modes.pop();
        self.reset_insertion_mode();
    }

    fn handle_in_head_noscript(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::EndTag(tag) if tag.name == "noscript" => {
                let _ = self.open.pop();
                self.mode = InsertionMode::InHead;
                Ok(None)
            }
            Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            }
            | Token::Comment(_) => self.handle_in_head(token, tokenizer),
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style"
                ) =>
            {
                self.handle_in_head(Token::StartTag(tag), tokenizer)
            }
            Token::StartTag(tag) if matches!(tag.name.as_str(), "head" | "noscript") => {
                self.err(ParseErrorCode::MisplacedStartTag);
                Ok(None)
            }
            Token::EndTag(tag) if tag.name != "br" => {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            token => {
                self.err(ParseErrorCode::UnexpectedToken);
                let _ = self.open.pop();
                self.mode = InsertionMode::InHead;
                Ok(Some(token))
            }
        }
    }

    fn handle_after_head(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) => match tag.name.clone().as_str() {
                "html" => self.handle_in_body(Token::StartTag(tag), tokenizer),
                "body" => {
                    self.insert_html_element(&tag)?;
                    self.frameset_ok = false;
                    self.mode = InsertionMode::InBody;
                    Ok(None)
                }
                "frameset" => {
                    self.insert_html_element(&tag)?;
                    self.mode = InsertionMode::InFrameset;
                    Ok(None)
                }
                "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                | "style" | "template" | "title" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    let head = self.head.ok_or(EngineInvariantError)?;
                    self.open.push(head, "head", Namespace::Html);
                    let result = self.handle_in_head(Token::StartTag(tag), tokenizer)?;
                    self.open.remove(head);
                    Ok(result)
                }
                "head" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    Ok(None)
                }
                _ => {
                    self.insert_phantom("body")?;
                    self.mode = InsertionMode::InBody;
                    Ok(Some(Token::StartTag(tag)))
                }
            },
            Token::EndTag(tag) => match tag.name.clone().as_str() {
                "template" => self.handle_in_head(Token::EndTag(tag), tokenizer),
                "body" | "html" | "br" => {
                    self.insert_phantom("body")?;
                    self.mode = InsertionMode::InBody;
                    Ok(Some(Token::EndTag(tag)))
                }
                _ => {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    Ok(None)
                }
            },
            token => {
                self.insert_phantom("body")?;
                self.mode = InsertionMode::InBody;
                Ok(Some(token))
            }
        }
    }

    fn handle_text(&mut self, token: Token) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters { text, .. } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Eof => {
                self.err(ParseErrorCode::EofInText);
                let _ = self.open.pop();
                self.mode = self.original_mode;
                Ok(Some(Token::Eof))
            }
            Token::EndTag(_) => {
                let _ = self.open.pop();
                self.mode = self.original_mode;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_in_body(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Null,
                ..
            } => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                Ok(None)
            }
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => {
                self.reconstruct_active_formatting_elements()?;
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Characters { text, .. } => {
                self.reconstruct_active_formatting_elements()?;
                self.insert_characters(&text)?;
                self.frameset_ok = false;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) => self.in_body_start_tag(tag, tokenizer),
            Token::EndTag(tag) => self.in_body_end_tag(tag, tokenizer),
            Token::Eof => {
                if !self.template_modes.is_empty() {
                    return Ok(self.eof_in_template());
                }
                self.check_unclosed_elements();
                self.stop_parsing();
                Ok(None)
            }
            Token::Hibernation => Ok(None),
        }
    }

    fn check_unclosed_elements(&mut self) {
        for index in 0..self.open.len() {
            let entry = self.open.get(index).expect("index in range");
            let allowed = entry.ns == Namespace::Html
                && matches!(
                    entry.name.as_str(),
                    "dd" | "dt"
                        | "li"
                        | "optgroup"
                        | "option"
                        | "p"
                        | "rb"
                        | "rp"
                        | "rt"
                        | "rtc"
                        | "tbody"
                        | "td"
                        | "tfoot"
                        | "th"
                        | "thead"
                        | "tr"
                        | "body"
                        | "html"
                );
            if !allowed {
                self.err(ParseErrorCode::UnexpectedEof);
                break;
            }
        }
    }

    fn eof_in_template(&mut self) -> Option<Token> {
        if !self.open.has_template() {
            self.stop_parsing();
            return None;
        }
        self.err(ParseErrorCode::UnexpectedEof);
        self.open.pop_until_tag_name_popped("template");
        self.formatting.clear_to_last_marker();
        let _ = self.template_modes.pop();
        self.reset_insertion_mode();
        Some(Token::Eof)
    }

    fn in_body_start_tag(
        &mut self,
        tag: TagToken,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match tag.name.clone().as_str() {
            "html" => {
                self.err(ParseErrorCode::MisplacedStartTag);
                if !self.open.has_template() {
                    let root = self.open.get(0).ok_or(EngineInvariantError)?.element;
                    self.sink.adopt_attributes(root, tag.attrs);
                }
                Ok(None)
            }
            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style"
            | "template" | "title" => self.handle_in_head(Token::StartTag(tag), tokenizer),
            "body" => {
                self.err(ParseErrorCode::MisplacedStartTag);
                let second_is_body = self.open.get(1).is_some_and(|e| e.is_html("body"));
                if self.open.len() == 1 || !second_is_body || self.open.has_template() {
                    return Ok(None);
                }
                self.frameset_ok = false;
                let body = self.open.get(1).ok_or(EngineInvariantError)?.element;
                self.sink.adopt_attributes(body, tag.attrs);
                Ok(None)
            }
            "frameset" => {
                self.err(ParseErrorCode::MisplacedStartTag);
                let second_is_body = self.open.get(1).is_some_and(|e| e.is_html("body"));
                if self.open.len() == 1 || !second_is_body || !self.frameset_ok {
                    return Ok(None);
                }
                let body = self.open.get(1).ok_or(EngineInvariantError)?.element;
                self.detach(body);
                while self.open.len() > 1 {
                    let _ = self.open.pop();
                }
                self.insert_html_element(&tag)?;
                self.mode = InsertionMode::InFrameset;
                Ok(None)
            }
            "address" | "article" | "aside" | "blockquote" | "center" | "details" | "dialog"
            | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer" | "header"
            | "hgroup" | "main" | "menu" | "nav" | "ol" | "p" | "search" | "section" | "summary"
            | "ul" => {
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                self.insert_html_element(&tag)?;
                Ok(None)
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                let current_is_header = self
                    .open
                    .current()
                    .is_some_and(|e| e.ns == Namespace::Html && tags::is_numbered_header(&e.name));
                if current_is_header {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    let _ = self.open.pop();
                }
                self.insert_html_element(&tag)?;
                Ok(None)
            }
            "pre" | "listing" => {
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                self.insert_html_element(&tag)?;
                self.skip_next_newline = true;
                self.frameset_ok = false;
                Ok(None)
            }
            "form" => {
                if self.form.is_some() && !self.open.has_template() {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    return Ok(None);
                }
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                let element = self.insert_html_element(&tag)?;
                if !self.open.has_template() {
                    self.form = Some(element);
                }
                Ok(None)
            }
            "li" => {
                self.list_item_start_tag(&tag, &["li"])?;
                Ok(None)
            }
            "dd" | "dt" => {
                self.list_item_start_tag(&tag, &["dd", "dt"])?;
                Ok(None)
            }
            "plaintext" => {
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                self.insert_html_element(&tag)?;
                tokenizer.set_state(TokenizerState::Plaintext);
                Ok(None)
            }
            "button" => {
                if self.open.has_in_scope("button", Scope::Default) {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    self.open.generate_implied_end_tags(None);
                    self.open.pop_until_tag_name_popped("button");
                }
                self.reconstruct_active_formatting_elements()?;
                self.insert_html_element(&tag)?;
                self.frameset_ok = false;
                Ok(None)
            }
            "a" => {
                if let Some(index) = self.formatting.entry_in_scope_with_tag_name("a") {
                    let element = match self.formatting.get(index) {
                        Some(FormattingEntry::Element { element, .. }) => *element,
                        _ => return Err(EngineInvariantError),
                    };
                    self.err(ParseErrorCode::MisplacedStartTag);
                    self.adoption_agency("a")?;
                    // Remove the offending entry if the agency left it behind.
                    self.formatting.remove_element(element);
                    self.open.remove(element);
                }
                self.reconstruct_active_formatting_elements()?;
                let element = self.insert_html_element(&tag)?;
                self.formatting.push(element, tag);
                Ok(None)
            }
            "b" | "big" | "code" | "em" | "font" | "i" | "s" | "small" | "strike" | "strong"
            | "tt" | "u" => {
                self.reconstruct_active_formatting_elements()?;
                let element = self.insert_html_element(&tag)?;
                self.formatting.push(element, tag);
                Ok(None)
            }
            "nobr" => {
                self.reconstruct_active_formatting_elements()?;
                if self.open.has_in_scope("nobr", Scope::Default) {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    self.adoption_agency("nobr")?;
                    self.reconstruct_active_formatting_elements()?;
                }
                let element = self.insert_html_element(&tag)?;
                self.formatting.push(element, tag);
                Ok(None)
            }
            "applet" | "marquee" | "object" => {
                self.reconstruct_active_formatting_elements()?;
                self.insert_html_element(&tag)?;
                self.formatting.insert_marker();
                self.frameset_ok = false;
                Ok(None)
            }
            "table" => {
                if self.doc_mode != DocumentMode::Quirks
                    && self.open.has_in_scope("p", Scope::Button)
                {
                    self.close_p_element();
                }
                self.insert_html_element(&tag)?;
                self.frameset_ok = false;
                self.mode = InsertionMode::InTable;
                Ok(None)
            }
            "area" | "br" | "embed" | "img" | "keygen" | "wbr" => {
                self.reconstruct_active_formatting_elements()?;
                self.insert_html_element(&tag)?;
                let _ = self.open.pop();
                self.ack();
                self.frameset_ok = false;
                Ok(None)
            }
            "input" => {
                self.reconstruct_active_formatting_elements()?;
                let hidden = tag
                    .attr("type")
                    .is_some_and(|value| value.eq_ignore_ascii_case("hidden"));
                self.insert_html_element(&tag)?;
                let _ = self.open.pop();
                self.ack();
                if !hidden {
                    self.frameset_ok = false;
                }
                Ok(None)
            }
            "param" | "source" | "track" => {
                self.insert_html_element(&tag)?;
                let _ = self.open.pop();
                self.ack();
                Ok(None)
            }
            "hr" => {
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                self.insert_html_element(&tag)?;
                let _ = self.open.pop();
                self.ack();
                self.frameset_ok = false;
                Ok(None)
            }
            "image" => {
                self.err(ParseErrorCode::UnexpectedStartTag);
                let mut tag = tag;
                tag.name.clear();
                tag.name.push_str("img");
                self.in_body_start_tag(tag, tokenizer)
            }
            "textarea" => {
                self.insert_html_element(&tag)?;
                self.skip_next_newline = true;
                tokenizer.set_state(TokenizerState::Rcdata);
                self.original_mode = self.mode;
                self.frameset_ok = false;
                self.mode = InsertionMode::Text;
                Ok(None)
            }
            "xmp" => {
                if self.open.has_in_scope("p", Scope::Button) {
                    self.close_p_element();
                }
                self.reconstruct_active_formatting_elements()?;
                self.frameset_ok = false;
                self.generic_raw_text(&tag, tokenizer, TokenizerState::Rawtext)?;
                Ok(None)
            }
            "iframe" => {
                self.frameset_ok = false;
                self.generic_raw_text(&tag, tokenizer, TokenizerState::Rawtext)?;
                Ok(None)
            }
            "noembed" => {
                self.generic_raw_text(&tag, tokenizer, TokenizerState::Rawtext)?;
                Ok(None)
            }
            "noscript" if self.config.scripting_enabled => {
                self.generic_raw_text(&tag, tokenizer, TokenizerState::Rawtext)?;
                Ok(None)
            }
            "select" => {
                self.reconstruct_active_formatting_elements()?;
                self.insert_html_element(&tag)?;
                self.frameset_ok = false;
                self.mode = match self.mode {
                    InsertionMode::InTable
                    | InsertionMode::InCaption
                    | InsertionMode::InTableBody
                    | InsertionMode::InRow
                    | InsertionMode::InCell => InsertionMode::InSelectInTable,
                    _ => InsertionMode::InSelect,
                };
                Ok(None)
            }
            "optgroup" | "option" => {
                if self.current_is("option") {
                    let _ = self.open.pop();
                }
                self.reconstruct_active_formatting_elements()?;
                self.insert_html_element(&tag)?;
                Ok(None)
            }
            "rb" | "rtc" => {
                if self.open.has_in_scope("ruby", Scope::Default) {
                    self.open.generate_implied_end_tags(None);
                    if !self.current_is("ruby") {
                        self.err(ParseErrorCode::MisplacedStartTag);
                    }
                }
                self.insert_html_element(&tag)?;
                Ok(None)
            }
            "rp" | "rt" => {
                if self.open.has_in_scope("ruby", Scope::Default) {
                    self.open.generate_implied_end_tags(Some("rtc"));
                    if !self.current_is("ruby") && !self.current_is("rtc") {
                        self.err(ParseErrorCode::MisplacedStartTag);
                    }
                }
                self.insert_html_element(&tag)?;
                Ok(None)
            }
            "math" => {
                self.reconstruct_active_formatting_elements()?;
                let mut tag = tag;
                foreign::adjust_mathml_attributes(&mut tag);
                foreign::adjust_foreign_attributes(&mut tag);
                self.insert_foreign_element(&tag, Namespace::MathMl)?;
                if tag.self_closing {
                    let _ = self.open.pop();
                    self.ack();
                }
                Ok(None)
            }
            "svg" => {
                self.reconstruct_active_formatting_elements()?;
                let mut tag = tag;
                foreign::adjust_svg_attributes(&mut tag);
                foreign::adjust_foreign_attributes(&mut tag);
                self.insert_foreign_element(&tag, Namespace::Svg)?;
                if tag.self_closing {
                    let _ = self.open.pop();
                    self.ack();
                }
                Ok(None)
            }
            "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td" | "tfoot" | "th"
            | "thead" | "tr" => {
                self.err(ParseErrorCode::MisplacedStartTag);
                Ok(None)
            }
            _ => {
                self.reconstruct_active_formatting_elements()?;
                self.insert_html_element(&tag)?;
                Ok(None)
            }
        }
    }

    fn list_item_start_tag(
        &mut self,
        tag: &TagToken,
        closeable: &[&str],
    ) -> Result<(), EngineInvariantError> {
        self.frameset_ok = false;
        for index in (0..self.open.len()).rev() {
            let (name, ns) = {
                let entry = self.open.get(index).ok_or(EngineInvariantError)?;
                (entry.name.clone(), entry.ns)
            };
            if ns == Namespace::Html && closeable.contains(&name.as_str()) {
                self.open.generate_implied_end_tags(Some(&name));
                if !self.current_is(&name) {
                    self.err(ParseErrorCode::UnexpectedStartTag);
                }
                self.open.pop_until_tag_name_popped(&name);
                break;
            }
            if tags::is_special(&name, ns)
                && !(ns == Namespace::Html && matches!(name.as_str(), "address" | "div" | "p"))
            {
                break;
            }
        }
        if self.open.has_in_scope("p", Scope::Button) {
            self.close_p_element();
        }
        self.insert_html_element(tag)?;
        Ok(())
    }

    fn in_body_end_tag(
        &mut self,
        tag: TagToken,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match tag.name.clone().as_str() {
            "template" => self.handle_in_head(Token::EndTag(tag), tokenizer),
            "body" => {
                if !self.open.has_in_scope("body", Scope::Default) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.check_unclosed_elements();
                self.mode = InsertionMode::AfterBody;
                Ok(None)
            }
            "html" => {
                if !self.open.has_in_scope("body", Scope::Default) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.check_unclosed_elements();
                self.mode = InsertionMode::AfterBody;
                Ok(Some(Token::EndTag(tag)))
            }
            "address" | "article" | "aside" | "blockquote" | "button" | "center" | "details"
            | "dialog" | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer"
            | "header" | "hgroup" | "listing" | "main" | "menu" | "nav" | "ol" | "pre"
            | "search" | "section" | "summary" | "ul" => {
                if !self.open.has_in_scope(&tag.name, Scope::Default) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.generate_implied_end_tags(None);
                if !self.current_is(&tag.name) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_tag_name_popped(&tag.name);
                Ok(None)
            }
            "form" => {
                if !self.open.has_template() {
                    let node = self.form.take();
                    let Some(node) = node else {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                        return Ok(None);
                    };
                    if !self.open.has_element_in_scope(node) {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                        return Ok(None);
                    }
                    self.open.generate_implied_end_tags(None);
                    if self.current_element()? != node {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                    }
                    self.open.remove(node);
                } else {
                    if !self.open.has_in_scope("form", Scope::Default) {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                        return Ok(None);
                    }
                    self.open.generate_implied_end_tags(None);
                    if !self.current_is("form") {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                    }
                    self.open.pop_until_tag_name_popped("form");
                }
                Ok(None)
            }
            "p" => {
                if !self.open.has_in_scope("p", Scope::Button) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    self.insert_phantom("p")?;
                }
                self.close_p_element();
                Ok(None)
            }
            "li" => {
                if !self.open.has_in_scope("li", Scope::ListItem) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.generate_implied_end_tags(Some("li"));
                if !self.current_is("li") {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_tag_name_popped("li");
                Ok(None)
            }
            "dd" | "dt" => {
                if !self.open.has_in_scope(&tag.name, Scope::Default) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.generate_implied_end_tags(Some(&tag.name));
                if !self.current_is(&tag.name) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_tag_name_popped(&tag.name);
                Ok(None)
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if !self.open.has_numbered_header_in_scope() {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.generate_implied_end_tags(None);
                if !self.current_is(&tag.name) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_numbered_header_popped();
                Ok(None)
            }
            "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small"
            | "strike" | "strong" | "tt" | "u" => {
                self.adoption_agency(&tag.name)?;
                Ok(None)
            }
            "applet" | "marquee" | "object" => {
                if !self.open.has_in_scope(&tag.name, Scope::Default) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.generate_implied_end_tags(None);
                if !self.current_is(&tag.name) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_tag_name_popped(&tag.name);
                self.formatting.clear_to_last_marker();
                Ok(None)
            }
            "br" => {
                self.err(ParseErrorCode::UnexpectedEndTag);
                self.reconstruct_active_formatting_elements()?;
                self.insert_phantom("br")?;
                let _ = self.open.pop();
                self.frameset_ok = false;
                Ok(None)
            }
            _ => {
                self.any_other_end_tag_in_body(&tag.name);
                Ok(None)
            }
        }
    }

    fn handle_in_table(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters { .. } => {
                let current_is_table_context = self.open.current().is_some_and(|entry| {
                    entry.ns == Namespace::Html
                        && matches!(
                            entry.name.as_str(),
                            "table" | "tbody" | "template" | "tfoot" | "thead" | "tr"
                        )
                });
                if current_is_table_context {
                    self.pending_table_text.clear();
                    self.original_mode = self.mode;
                    self.mode = InsertionMode::InTableText;
                    Ok(Some(token))
                } else {
                    self.in_table_anything_else(token, tokenizer)
                }
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) => match tag.name.clone().as_str() {
                "caption" => {
                    self.open.clear_back_to_table_context();
                    self.formatting.insert_marker();
                    self.insert_html_element(&tag)?;
                    self.mode = InsertionMode::InCaption;
                    Ok(None)
                }
                "colgroup" => {
                    self.open.clear_back_to_table_context();
                    self.insert_html_element(&tag)?;
                    self.mode = InsertionMode::InColumnGroup;
                    Ok(None)
                }
                "col" => {
                    self.open.clear_back_to_table_context();
                    self.insert_phantom("colgroup")?;
                    self.mode = InsertionMode::InColumnGroup;
                    Ok(Some(Token::StartTag(tag)))
                }
                "tbody" | "tfoot" | "thead" => {
                    self.open.clear_back_to_table_context();
                    self.insert_html_element(&tag)?;
                    self.mode = InsertionMode::InTableBody;
                    Ok(None)
                }
                "td" | "th" | "tr" => {
                    self.open.clear_back_to_table_context();
                    self.insert_phantom("tbody")?;
                    self.mode = InsertionMode::InTableBody;
                    Ok(Some(Token::StartTag(tag)))
                }
                "table" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    if !self.open.has_in_scope("table", Scope::Table) {
                        return Ok(None);
                    }
                    self.open.pop_until_tag_name_popped("table");
                    self.reset_insertion_mode();
                    Ok(Some(Token::StartTag(tag)))
                }
                "style" | "script" | "template" => {
                    self.handle_in_head(Token::StartTag(tag), tokenizer)
                }
                "input" => {
                    let hidden = tag
                        .attr("type")
                        .is_some_and(|value| value.eq_ignore_ascii_case("hidden"));
                    if !hidden {
                        return self.in_table_anything_else(Token::StartTag(tag), tokenizer);
                    }
                    self.err(ParseErrorCode::MisplacedStartTag);
                    self.insert_html_element(&tag)?;
                    let _ = self.open.pop();
                    self.ack();
                    Ok(None)
                }
                "form" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    if self.open.has_template() || self.form.is_some() {
                        return Ok(None);
                    }
                    let element = self.insert_html_element(&tag)?;
                    self.form = Some(element);
                    let _ = self.open.pop();
                    Ok(None)
                }
                _ => self.in_table_anything_else(Token::StartTag(tag), tokenizer),
            },
            Token::EndTag(tag) => match tag.name.clone().as_str() {
                "table" => {
                    if !self.open.has_in_scope("table", Scope::Table) {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                        return Ok(None);
                    }
                    self.open.pop_until_tag_name_popped("table");
                    self.reset_insertion_mode();
                    Ok(None)
                }
                "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot"
                | "th" | "thead" | "tr" => {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    Ok(None)
                }
                "template" => self.handle_in_head(Token::EndTag(tag), tokenizer),
                _ => self.in_table_anything_else(Token::EndTag(tag), tokenizer),
            },
            Token::Eof => self.handle_in_body(Token::Eof, tokenizer),
            Token::Hibernation => Ok(None),
        }
    }

    /// Misnested table content: re-enter the in-body rules with foster
    /// parenting enabled.
    fn in_table_anything_else(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        self.err(ParseErrorCode::UnexpectedToken);
        self.foster_parenting = true;
        let result = self.handle_in_body(token, tokenizer);
        self.foster_parenting = false;
        result
    }

    fn handle_in_table_text(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Null,
                ..
            } => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                Ok(None)
            }
            Token::Characters { kind, text } => {
                self.pending_table_text.push((kind, text));
                Ok(None)
            }
            token => {
                let pending = std::mem::take(&mut self.pending_table_text);
                let has_non_ws = pending
                    .iter()
                    .any(|(kind, _)| *kind == CharacterKind::Ordinary);
                if has_non_ws {
                    self.err(ParseErrorCode::UnexpectedToken);
                    for (kind, text) in pending {
                        self.foster_parenting = true;
                        let reprocess =
                            self.handle_in_body(Token::Characters { kind, text }, tokenizer)?;
                        self.foster_parenting = false;
                        debug_assert!(reprocess.is_none(), "character tokens never reprocess");
                    }
                } else {
                    for (_, text) in pending {
                        self.insert_characters(&text)?;
                    }
                }
                self.mode = self.original_mode;
                Ok(Some(token))
            }
        }
    }

    fn handle_in_caption(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        let close_caption = |builder: &mut Self| -> bool {
            if !builder.open.has_in_scope("caption", Scope::Table) {
                builder.err(ParseErrorCode::UnexpectedToken);
                return false;
            }
            builder.open.generate_implied_end_tags(None);
            if !builder.current_is("caption") {
                builder.err(ParseErrorCode::UnexpectedEndTag);
            }
            builder.open.pop_until_tag_name_popped("caption");
            builder.formatting.clear_to_last_marker();
            builder.mode = InsertionMode::InTable;
            true
        };
        match token {
            Token::EndTag(tag) if tag.name == "caption" => {
                let _ = close_caption(self);
                Ok(None)
            }
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                if close_caption(self) {
                    Ok(Some(Token::StartTag(tag)))
                } else {
                    Ok(None)
                }
            }
            Token::EndTag(tag) if tag.name == "table" => {
                if close_caption(self) {
                    Ok(Some(Token::EndTag(tag)))
                } else {
                    Ok(None)
                }
            }
            Token::EndTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                        | "thead" | "tr"
                ) =>
            {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            token => self.handle_in_body(token, tokenizer),
        }
    }

    fn handle_in_column_group(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::StartTag(tag) if tag.name == "col" => {
                self.insert_html_element(&tag)?;
                let _ = self.open.pop();
                self.ack();
                Ok(None)
            }
            Token::EndTag(tag) if tag.name == "colgroup" => {
                if !self.current_is("colgroup") {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                let _ = self.open.pop();
                self.mode = InsertionMode::InTable;
                Ok(None)
            }
            Token::EndTag(tag) if tag.name == "col" => {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            Token::StartTag(tag) if tag.name == "template" => {
                self.handle_in_head(Token::StartTag(tag), tokenizer)
            }
            Token::EndTag(tag) if tag.name == "template" => {
                self.handle_in_head(Token::EndTag(tag), tokenizer)
            }
            Token::Eof => self.handle_in_body(Token::Eof, tokenizer),
            token => {
                if !self.current_is("colgroup") {
                    self.err(ParseErrorCode::UnexpectedToken);
                    return Ok(None);
                }
                let _ = self.open.pop();
                self.mode = InsertionMode::InTable;
                Ok(Some(token))
            }
        }
    }

    fn handle_in_table_body(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::StartTag(tag) if tag.name == "tr" => {
                self.open.clear_back_to_table_body_context();
                self.insert_html_element(&tag)?;
                self.mode = InsertionMode::InRow;
                Ok(None)
            }
            Token::StartTag(tag) if matches!(tag.name.as_str(), "th" | "td") => {
                self.err(ParseErrorCode::MisplacedStartTag);
                self.open.clear_back_to_table_body_context();
                self.insert_phantom("tr")?;
                self.mode = InsertionMode::InRow;
                Ok(Some(Token::StartTag(tag)))
            }
            Token::EndTag(tag) if matches!(tag.name.as_str(), "tbody" | "tfoot" | "thead") => {
                if !self.open.has_in_scope(&tag.name, Scope::Table) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.clear_back_to_table_body_context();
                let _ = self.open.pop();
                self.mode = InsertionMode::InTable;
                Ok(None)
            }
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead"
                ) =>
            {
                self.end_table_body_section(Token::StartTag(tag))
            }
            Token::EndTag(tag) if tag.name == "table" => {
                self.end_table_body_section(Token::EndTag(tag))
            }
            Token::EndTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr"
                ) =>
            {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            token => self.handle_in_table(token, tokenizer),
        }
    }

    fn end_table_body_section(
        &mut self,
        token: Token,
    ) -> Result<Option<Token>, EngineInvariantError> {
        let has_section = self.open.has_in_scope("tbody", Scope::Table)
            || self.open.has_in_scope("thead", Scope::Table)
            || self.open.has_in_scope("tfoot", Scope::Table);
        if !has_section {
            self.err(ParseErrorCode::UnexpectedToken);
            return Ok(None);
        }
        self.open.clear_back_to_table_body_context();
        let _ = self.open.pop();
        self.mode = InsertionMode::InTable;
        Ok(Some(token))
    }

    fn handle_in_row(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::StartTag(tag) if matches!(tag.name.as_str(), "th" | "td") => {
                self.open.clear_back_to_table_row_context();
                self.insert_html_element(&tag)?;
                self.mode = InsertionMode::InCell;
                self.formatting.insert_marker();
                Ok(None)
            }
            Token::EndTag(tag) if tag.name == "tr" => {
                if !self.open.has_in_scope("tr", Scope::Table) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.clear_back_to_table_row_context();
                let _ = self.open.pop();
                self.mode = InsertionMode::InTableBody;
                Ok(None)
            }
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr"
                ) =>
            {
                self.end_table_row(Token::StartTag(tag))
            }
            Token::EndTag(tag) if tag.name == "table" => self.end_table_row(Token::EndTag(tag)),
            Token::EndTag(tag) if matches!(tag.name.as_str(), "tbody" | "tfoot" | "thead") => {
                if !self.open.has_in_scope(&tag.name, Scope::Table) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.end_table_row(Token::EndTag(tag))
            }
            Token::EndTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th"
                ) =>
            {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            token => self.handle_in_table(token, tokenizer),
        }
    }

    fn end_table_row(&mut self, token: Token) -> Result<Option<Token>, EngineInvariantError> {
        if !self.open.has_in_scope("tr", Scope::Table) {
            self.err(ParseErrorCode::UnexpectedToken);
            return Ok(None);
        }
        self.open.clear_back_to_table_row_context();
        let _ = self.open.pop();
        self.mode = InsertionMode::InTableBody;
        Ok(Some(token))
    }

    fn handle_in_cell(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::EndTag(tag) if matches!(tag.name.as_str(), "td" | "th") => {
                if !self.open.has_in_scope(&tag.name, Scope::Table) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.open.generate_implied_end_tags(None);
                if !self.current_is(&tag.name) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                }
                self.open.pop_until_tag_name_popped(&tag.name);
                self.formatting.clear_to_last_marker();
                self.mode = InsertionMode::InRow;
                Ok(None)
            }
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                let has_cell = self.open.has_in_scope("td", Scope::Table)
                    || self.open.has_in_scope("th", Scope::Table);
                if !has_cell {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    return Ok(None);
                }
                self.close_table_cell();
                Ok(Some(Token::StartTag(tag)))
            }
            Token::EndTag(tag)
                if matches!(tag.name.as_str(), "body" | "caption" | "col" | "colgroup" | "html") =>
            {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            Token::EndTag(tag)
                if matches!(tag.name.as_str(), "table" | "tbody" | "tfoot" | "thead" | "tr") =>
            {
                if !self.open.has_in_scope(&tag.name, Scope::Table) {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.close_table_cell();
                Ok(Some(Token::EndTag(tag)))
            }
            token => self.handle_in_body(token, tokenizer),
        }
    }

    fn handle_in_select(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Null,
                ..
            } => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                Ok(None)
            }
            Token::Characters { text, .. } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) => match tag.name.clone().as_str() {
                "html" => self.handle_in_body(Token::StartTag(tag), tokenizer),
                "option" => {
                    if self.current_is("option") {
                        let _ = self.open.pop();
                    }
                    self.insert_html_element(&tag)?;
                    Ok(None)
                }
                "optgroup" => {
                    if self.current_is("option") {
                        let _ = self.open.pop();
                    }
                    if self.current_is("optgroup") {
                        let _ = self.open.pop();
                    }
                    self.insert_html_element(&tag)?;
                    Ok(None)
                }
                "hr" => {
                    if self.current_is("option") {
                        let _ = self.open.pop();
                    }
                    if self.current_is("optgroup") {
                        let _ = self.open.pop();
                    }
                    self.insert_html_element(&tag)?;
                    let _ = self.open.pop();
                    self.ack();
                    Ok(None)
                }
                "select" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    if !self.open.has_in_scope("select", Scope::Select) {
                        return Ok(None);
                    }
                    self.open.pop_until_tag_name_popped("select");
                    self.reset_insertion_mode();
                    Ok(None)
                }
                "input" | "keygen" | "textarea" => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    if !self.open.has_in_scope("select", Scope::Select) {
                        return Ok(None);
                    }
                    self.open.pop_until_tag_name_popped("select");
                    self.reset_insertion_mode();
                    Ok(Some(Token::StartTag(tag)))
                }
                "script" | "template" => self.handle_in_head(Token::StartTag(tag), tokenizer),
                _ => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    Ok(None)
                }
            },
            Token::EndTag(tag) => match tag.name.clone().as_str() {
                "optgroup" => {
                    if self.current_is("option") {
                        let below_is_optgroup = self
                            .open
                            .len()
                            .checked_sub(2)
                            .and_then(|index| self.open.get(index))
                            .is_some_and(|entry| entry.is_html("optgroup"));
                        if below_is_optgroup {
                            let _ = self.open.pop();
                        }
                    }
                    if self.current_is("optgroup") {
                        let _ = self.open.pop();
                    } else {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                    }
                    Ok(None)
                }
                "option" => {
                    if self.current_is("option") {
                        let _ = self.open.pop();
                    } else {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                    }
                    Ok(None)
                }
                "select" => {
                    if !self.open.has_in_scope("select", Scope::Select) {
                        self.err(ParseErrorCode::UnexpectedEndTag);
                        return Ok(None);
                    }
                    self.open.pop_until_tag_name_popped("select");
                    self.reset_insertion_mode();
                    Ok(None)
                }
                "template" => self.handle_in_head(Token::EndTag(tag), tokenizer),
                _ => {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    Ok(None)
                }
            },
            Token::Eof => self.handle_in_body(Token::Eof, tokenizer),
            Token::Hibernation => Ok(None),
        }
    }

    fn handle_in_select_in_table(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th"
                ) =>
            {
                self.err(ParseErrorCode::MisplacedStartTag);
                self.open.pop_until_tag_name_popped("select");
                self.reset_insertion_mode();
                Ok(Some(Token::StartTag(tag)))
            }
            Token::EndTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th"
                ) =>
            {
                self.err(ParseErrorCode::UnexpectedEndTag);
                if !self.open.has_in_scope(&tag.name, Scope::Table) {
                    return Ok(None);
                }
                self.open.pop_until_tag_name_popped("select");
                self.reset_insertion_mode();
                Ok(Some(Token::EndTag(tag)))
            }
            token => self.handle_in_select(token, tokenizer),
        }
    }

    fn handle_in_template(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters { .. } | Token::Comment(_) | Token::Doctype(_) => {
                self.handle_in_body(token, tokenizer)
            }
            Token::StartTag(tag)
                if matches!(
                    tag.name.as_str(),
                    "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                        | "style" | "template" | "title"
                ) =>
            {
                self.handle_in_head(Token::StartTag(tag), tokenizer)
            }
            Token::EndTag(tag) if tag.name == "template" => {
                self.handle_in_head(Token::EndTag(tag), tokenizer)
            }
            Token::StartTag(tag) => {
                let mode = match tag.name.as_str() {
                    "caption" | "colgroup" | "tbody" | "tfoot" | "thead" => InsertionMode::InTable,
                    "col" => InsertionMode::InColumnGroup,
                    "tr" => InsertionMode::InTableBody,
                    "td" | "th" => InsertionMode::InRow,
                    _ => InsertionMode::InBody,
                };
                let _ = self.template_modes.pop();
                self.template_modes.push(mode);
                self.mode = mode;
                Ok(Some(Token::StartTag(tag)))
            }
            Token::EndTag(_) => {
                self.err(ParseErrorCode::UnexpectedEndTag);
                Ok(None)
            }
            Token::Eof => Ok(self.eof_in_template()),
            Token::Hibernation => Ok(None),
        }
    }

    fn handle_after_body(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            } => self.handle_in_body(token, tokenizer),
            Token::Comment(text) => {
                let root = self.open.get(0).ok_or(EngineInvariantError)?.element;
                self.insert_comment_into(root, &text);
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::EndTag(tag) if tag.name == "html" => {
                if self.fragment_ctx.is_some() {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                self.mode = InsertionMode::AfterAfterBody;
                Ok(None)
            }
            Token::Eof => {
                self.stop_parsing();
                Ok(None)
            }
            token => {
                self.err(ParseErrorCode::UnexpectedToken);
                self.mode = InsertionMode::InBody;
                Ok(Some(token))
            }
        }
    }

    fn handle_in_frameset(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) => match tag.name.clone().as_str() {
                "html" => self.handle_in_body(Token::StartTag(tag), tokenizer),
                "frameset" => {
                    self.insert_html_element(&tag)?;
                    Ok(None)
                }
                "frame" => {
                    self.insert_html_element(&tag)?;
                    let _ = self.open.pop();
                    self.ack();
                    Ok(None)
                }
                "noframes" => self.handle_in_head(Token::StartTag(tag), tokenizer),
                _ => {
                    self.err(ParseErrorCode::MisplacedStartTag);
                    Ok(None)
                }
            },
            Token::EndTag(tag) if tag.name == "frameset" => {
                if self.current_is("html") {
                    self.err(ParseErrorCode::UnexpectedEndTag);
                    return Ok(None);
                }
                let _ = self.open.pop();
                if self.fragment_ctx.is_none() && !self.current_is("frameset") {
                    self.mode = InsertionMode::AfterFrameset;
                }
                Ok(None)
            }
            Token::Eof => {
                if !self.current_is("html") {
                    self.err(ParseErrorCode::UnexpectedEof);
                }
                self.stop_parsing();
                Ok(None)
            }
            _ => {
                self.err(ParseErrorCode::UnexpectedToken);
                Ok(None)
            }
        }
    }

    fn handle_after_frameset(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Characters {
                kind: CharacterKind::Whitespace,
                text,
            } => {
                self.insert_characters(&text)?;
                Ok(None)
            }
            Token::Comment(text) => {
                self.insert_comment(&text)?;
                Ok(None)
            }
            Token::Doctype(_) => {
                self.err(ParseErrorCode::MisplacedDoctype);
                Ok(None)
            }
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::StartTag(tag) if tag.name == "noframes" => {
                self.handle_in_head(Token::StartTag(tag), tokenizer)
            }
            Token::EndTag(tag) if tag.name == "html" => {
                self.mode = InsertionMode::AfterAfterFrameset;
                Ok(None)
            }
            Token::Eof => {
                self.stop_parsing();
                Ok(None)
            }
            _ => {
                self.err(ParseErrorCode::UnexpectedToken);
                Ok(None)
            }
        }
    }

    fn handle_after_after_body(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Comment(text) => {
                self.insert_comment_into(self.document, &text);
                Ok(None)
            }
            Token::Doctype(_)
            | Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            } => self.handle_in_body(token, tokenizer),
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::Eof => {
                self.stop_parsing();
                Ok(None)
            }
            token => {
                self.err(ParseErrorCode::UnexpectedToken);
                self.mode = InsertionMode::InBody;
                Ok(Some(token))
            }
        }
    }

    fn handle_after_after_frameset(
        &mut self,
        token: Token,
        tokenizer: &mut Tokenizer,
    ) -> Result<Option<Token>, EngineInvariantError> {
        match token {
            Token::Comment(text) => {
                self.insert_comment_into(self.document, &text);
                Ok(None)
            }
            Token::Doctype(_)
            | Token::Characters {
                kind: CharacterKind::Whitespace,
                ..
            } => self.handle_in_body(token, tokenizer),
            Token::StartTag(tag) if tag.name == "html" => {
                self.handle_in_body(Token::StartTag(tag), tokenizer)
            }
            Token::StartTag(tag) if tag.name == "noframes" => {
                self.handle_in_head(Token::StartTag(tag), tokenizer)
            }
            Token::Eof => {
                self.stop_parsing();
                Ok(None)
            }
            _ => {
                self.err(ParseErrorCode::UnexpectedToken);
                Ok(None)
            }
        }
    }
}
