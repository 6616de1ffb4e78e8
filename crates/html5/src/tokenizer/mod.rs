//! HTML5 tokenizer.
//!
//! An explicit state machine driven by the preprocessor, resumable at chunk
//! boundaries. `get_next_token` runs the machine until at least one token is
//! queued; a single input character can finish one token and open a character
//! run in the same step, and character-reference expansion can emit several
//! code points at once, so tokens queue internally and drain one per call.
//!
//! Invariants:
//! - Chunk-equivalence: feeding input in one chunk or many chunks yields the
//!   same token sequence for equivalent text input.
//! - Hibernation is byte-for-byte resumable: every character consumed since
//!   the last snapshot is retreated before a `Hibernation` token is queued.
//! - Malformed input never fails; every branch has a defined recovery.

use std::collections::VecDeque;

use crate::entities;
use crate::error::{ParseError, ParseErrorCode};
use crate::preprocessor::Preprocessor;
use crate::token::{Attribute, CharacterKind, DoctypeToken, TagToken, Token};

mod states;
pub use states::TokenizerState;

#[cfg(test)]
mod tests;

/// Configuration for the tokenizer.
#[derive(Clone, Debug)]
pub struct TokenizerConfig {
    /// Emit an `Eof` token when the input ends.
    pub emit_eof: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { emit_eof: true }
    }
}

/// Minimal tokenizer instrumentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenizerStats {
    pub steps: u64,
    pub state_transitions: u64,
    pub tokens_emitted: u64,
}

fn is_ws(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0C' | ' ')
}

enum SeqMatch {
    Matched,
    NotMatched,
    NeedMoreInput,
}

pub struct Tokenizer {
    config: TokenizerConfig,
    state: TokenizerState,
    return_state: TokenizerState,
    tokens: VecDeque<Token>,

    /// Most recently consumed code point (`None` = EOF).
    cc: Option<char>,
    /// `cc` should be re-examined by the next dispatch instead of consuming.
    reconsume: bool,
    /// `cc` was consumed in the current snapshot (as opposed to reconsumed).
    cc_fresh: bool,
    consumed_after_snapshot: usize,
    pos: usize,

    pending_kind: Option<CharacterKind>,
    pending_text: String,

    current_tag: Option<TagToken>,
    current_tag_is_end: bool,
    current_attr_name: String,
    current_attr_value: String,
    has_current_attr: bool,
    current_comment: String,
    current_doctype: Option<DoctypeToken>,

    temp_buffer: String,
    char_ref_code: u32,
    last_start_tag: String,
    allow_cdata: bool,
    eof_emitted: bool,

    errors: Vec<ParseError>,
    stats: TokenizerStats,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self {
            config,
            state: TokenizerState::Data,
            return_state: TokenizerState::Data,
            tokens: VecDeque::new(),
            cc: None,
            reconsume: false,
            cc_fresh: false,
            consumed_after_snapshot: 0,
            pos: 0,
            pending_kind: None,
            pending_text: String::new(),
            current_tag: None,
            current_tag_is_end: false,
            current_attr_name: String::new(),
            current_attr_value: String::new(),
            has_current_attr: false,
            current_comment: String::new(),
            current_doctype: None,
            temp_buffer: String::new(),
            char_ref_code: 0,
            last_start_tag: String::new(),
            allow_cdata: false,
            eof_emitted: false,
            errors: Vec::new(),
            stats: TokenizerStats::default(),
        }
    }

    /// Externally driven mode switch (tree builder entering RAWTEXT, RCDATA,
    /// script data, or PLAINTEXT for the current element).
    pub fn set_state(&mut self, state: TokenizerState) {
        self.transition_to(state);
    }

    /// Seed the appropriate-end-tag check (fragment parsing, raw-text modes).
    pub fn set_last_start_tag(&mut self, name: &str) {
        self.last_start_tag.clear();
        self.last_start_tag.push_str(name);
    }

    /// Whether `<![CDATA[` opens a CDATA section (foreign-content contexts).
    pub fn set_allow_cdata(&mut self, allow: bool) {
        self.allow_cdata = allow;
    }

    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    /// Drive the state machine until a token is available.
    ///
    /// Returns `Token::Hibernation` when buffered input ran out before a token
    /// completed and more chunks may follow; all input consumed since the last
    /// snapshot has been retreated, so the caller can resume with `write` and
    /// call again.
    pub fn get_next_token(&mut self, input: &mut Preprocessor) -> Token {
        loop {
            if let Some(token) = self.tokens.pop_front() {
                return token;
            }
            if self.eof_emitted {
                return Token::Eof;
            }
            input.drop_parsed_chunk();
            self.consumed_after_snapshot = 0;
            self.stats.steps = self.stats.steps.saturating_add(1);
            let cc = self.consume(input);
            if cc.is_none() && input.end_of_chunk_hit() {
                debug_assert_eq!(self.consumed_after_snapshot, 0);
                return Token::Hibernation;
            }
            self.dispatch(cc, input);
        }
    }

    fn transition_to(&mut self, next: TokenizerState) {
        if self.state == next {
            return;
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "html5.tokenizer",
            "state {:?} -> {:?} @{}",
            self.state,
            next,
            self.pos
        );
        self.state = next;
        self.stats.state_transitions = self.stats.state_transitions.saturating_add(1);
    }

    fn reconsume_in(&mut self, next: TokenizerState) {
        self.reconsume = true;
        self.transition_to(next);
    }

    fn consume(&mut self, input: &mut Preprocessor) -> Option<char> {
        if self.reconsume {
            self.reconsume = false;
            self.cc_fresh = false;
            return self.cc;
        }
        let ch = input.advance();
        if ch.is_some() {
            self.consumed_after_snapshot += 1;
        }
        self.pos = input.position();
        self.cc = ch;
        self.cc_fresh = true;
        ch
    }

    /// Consume without touching `cc`; used by multi-character lookahead.
    fn consume_raw(&mut self, input: &mut Preprocessor) -> Option<char> {
        let ch = input.advance();
        if ch.is_some() {
            self.consumed_after_snapshot += 1;
        }
        ch
    }

    fn retreat_here(&mut self, input: &mut Preprocessor, count: usize) {
        for _ in 0..count {
            input.retreat();
        }
        self.consumed_after_snapshot -= count.min(self.consumed_after_snapshot);
    }

    /// Mid-state hibernation: rewind the whole snapshot and queue the token.
    fn hibernate(&mut self, input: &mut Preprocessor) {
        while self.consumed_after_snapshot > 0 {
            input.retreat();
            self.consumed_after_snapshot -= 1;
        }
        self.reconsume = !self.cc_fresh;
        self.tokens.push_back(Token::Hibernation);
    }

    /// Match `rest` (the sequence minus the already-consumed `cc`) ahead of
    /// the cursor. On `NotMatched` everything consumed here is retreated; on
    /// `NeedMoreInput` the caller must hibernate.
    fn consume_sequence_if_match(
        &mut self,
        input: &mut Preprocessor,
        rest: &[u8],
        case_insensitive: bool,
    ) -> SeqMatch {
        let mut taken = 0;
        for &b in rest {
            match self.consume_raw(input) {
                Some(c) => {
                    let expected = b as char;
                    let matched = if case_insensitive {
                        c.eq_ignore_ascii_case(&expected)
                    } else {
                        c == expected
                    };
                    if !matched {
                        self.retreat_here(input, taken + 1);
                        return SeqMatch::NotMatched;
                    }
                    taken += 1;
                }
                None => {
                    if input.end_of_chunk_hit() {
                        return SeqMatch::NeedMoreInput;
                    }
                    self.retreat_here(input, taken);
                    return SeqMatch::NotMatched;
                }
            }
        }
        SeqMatch::Matched
    }

    fn err(&mut self, code: ParseErrorCode) {
        self.errors.push(ParseError {
            code,
            position: self.pos,
        });
    }

    // ---- emission -------------------------------------------------------

    fn flush_pending_text(&mut self) {
        if let Some(kind) = self.pending_kind.take() {
            if !self.pending_text.is_empty() {
                let text = std::mem::take(&mut self.pending_text);
                self.push_token(Token::Characters { kind, text });
            }
        }
    }

    fn push_token(&mut self, token: Token) {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "html5.tokenizer", "emit token: {token:?}");
        self.tokens.push_back(token);
        self.stats.tokens_emitted = self.stats.tokens_emitted.saturating_add(1);
    }

    fn emit_token(&mut self, token: Token) {
        self.flush_pending_text();
        self.push_token(token);
    }

    fn append_char(&mut self, c: char) {
        let kind = CharacterKind::of(c);
        if self.pending_kind != Some(kind) {
            self.flush_pending_text();
            self.pending_kind = Some(kind);
        }
        self.pending_text.push(c);
    }

    fn emit_eof(&mut self) {
        self.flush_pending_text();
        if self.config.emit_eof {
            self.push_token(Token::Eof);
        }
        self.eof_emitted = true;
    }

    fn create_tag(&mut self, is_end: bool) {
        self.current_tag = Some(TagToken::new(String::new()));
        self.current_tag_is_end = is_end;
        self.current_attr_name.clear();
        self.current_attr_value.clear();
        self.has_current_attr = false;
    }

    fn append_to_tag_name(&mut self, c: char) {
        if let Some(tag) = self.current_tag.as_mut() {
            tag.name.push(c.to_ascii_lowercase());
        }
    }

    fn start_new_attribute(&mut self) {
        self.finish_current_attribute();
        self.has_current_attr = true;
    }

    fn finish_current_attribute(&mut self) {
        if !self.has_current_attr {
            return;
        }
        self.has_current_attr = false;
        let name = std::mem::take(&mut self.current_attr_name);
        let value = std::mem::take(&mut self.current_attr_value);
        let Some(tag) = self.current_tag.as_mut() else {
            return;
        };
        if tag.attrs.iter().any(|attr| attr.name == name) {
            // First occurrence wins; later duplicates are dropped.
            self.errors.push(ParseError {
                code: ParseErrorCode::DuplicateAttribute,
                position: self.pos,
            });
            return;
        }
        tag.attrs.push(Attribute {
            prefix: None,
            ns: None,
            name,
            value,
        });
    }

    fn is_appropriate_end_tag(&self) -> bool {
        self.current_tag_is_end
            && !self.last_start_tag.is_empty()
            && self
                .current_tag
                .as_ref()
                .is_some_and(|tag| tag.name == self.last_start_tag)
    }

    fn emit_current_tag(&mut self) {
        self.finish_current_attribute();
        let Some(tag) = self.current_tag.take() else {
            return;
        };
        if self.current_tag_is_end {
            if !tag.attrs.is_empty() {
                self.err(ParseErrorCode::EndTagWithAttributes);
            }
            if tag.self_closing {
                self.err(ParseErrorCode::EndTagWithTrailingSolidus);
            }
            self.emit_token(Token::EndTag(tag));
        } else {
            self.last_start_tag.clear();
            self.last_start_tag.push_str(&tag.name);
            self.emit_token(Token::StartTag(tag));
        }
    }

    fn emit_current_comment(&mut self) {
        let text = std::mem::take(&mut self.current_comment);
        self.emit_token(Token::Comment(text));
    }

    fn create_doctype(&mut self) {
        self.current_doctype = Some(DoctypeToken::default());
    }

    fn doctype_mut(&mut self) -> &mut DoctypeToken {
        self.current_doctype
            .get_or_insert_with(DoctypeToken::default)
    }

    fn emit_current_doctype(&mut self) {
        let doctype = self.current_doctype.take().unwrap_or_default();
        self.emit_token(Token::Doctype(doctype));
    }

    fn eof_in_doctype(&mut self) {
        self.err(ParseErrorCode::EofInDoctype);
        self.doctype_mut().force_quirks = true;
        self.emit_current_doctype();
        self.emit_eof();
    }

    // ---- character references -------------------------------------------

    fn char_ref_in_attribute(&self) -> bool {
        matches!(
            self.return_state,
            TokenizerState::AttributeValueDoubleQuoted
                | TokenizerState::AttributeValueSingleQuoted
                | TokenizerState::AttributeValueUnquoted
        )
    }

    /// Flush the temporary buffer either into the attribute value being built
    /// or as character tokens, per the return state.
    fn flush_char_ref_temp(&mut self) {
        let temp = std::mem::take(&mut self.temp_buffer);
        if self.char_ref_in_attribute() {
            self.current_attr_value.push_str(&temp);
        } else {
            for c in temp.chars() {
                self.append_char(c);
            }
        }
    }

    fn apply_numeric_reference(&mut self) {
        let (ch, error) = entities::normalize_numeric_reference(self.char_ref_code);
        if let Some(code) = error {
            self.err(code);
        }
        self.temp_buffer.clear();
        self.temp_buffer.push(ch);
        self.flush_char_ref_temp();
    }

    // ---- dispatch --------------------------------------------------------

    fn dispatch(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        use TokenizerState as S;
        match self.state {
            S::Data => self.step_data(cc, input),
            S::Rcdata => self.step_rcdata(cc, input),
            S::Rawtext => self.step_rawtext(cc, input),
            S::ScriptData => self.step_script_data(cc, input),
            S::Plaintext => self.step_plaintext(cc, input),
            S::TagOpen => self.step_tag_open(cc),
            S::EndTagOpen => self.step_end_tag_open(cc),
            S::TagName => self.step_tag_name(cc),
            S::RcdataLessThanSign => self.step_raw_less_than_sign(cc, S::Rcdata, S::RcdataEndTagOpen),
            S::RcdataEndTagOpen => self.step_raw_end_tag_open(cc, S::Rcdata, S::RcdataEndTagName),
            S::RcdataEndTagName => self.step_raw_end_tag_name(cc, S::Rcdata),
            S::RawtextLessThanSign => {
                self.step_raw_less_than_sign(cc, S::Rawtext, S::RawtextEndTagOpen)
            }
            S::RawtextEndTagOpen => self.step_raw_end_tag_open(cc, S::Rawtext, S::RawtextEndTagName),
            S::RawtextEndTagName => self.step_raw_end_tag_name(cc, S::Rawtext),
            S::ScriptDataLessThanSign => self.step_script_data_less_than_sign(cc),
            S::ScriptDataEndTagOpen => {
                self.step_raw_end_tag_open(cc, S::ScriptData, S::ScriptDataEndTagName)
            }
            S::ScriptDataEndTagName => self.step_raw_end_tag_name(cc, S::ScriptData),
            S::ScriptDataEscapeStart => self.step_script_data_escape_start(cc),
            S::ScriptDataEscapeStartDash => self.step_script_data_escape_start_dash(cc),
            S::ScriptDataEscaped => self.step_script_data_escaped(cc),
            S::ScriptDataEscapedDash => self.step_script_data_escaped_dash(cc),
            S::ScriptDataEscapedDashDash => self.step_script_data_escaped_dash_dash(cc),
            S::ScriptDataEscapedLessThanSign => self.step_script_data_escaped_less_than_sign(cc),
            S::ScriptDataEscapedEndTagOpen => {
                self.step_raw_end_tag_open(cc, S::ScriptDataEscaped, S::ScriptDataEscapedEndTagName)
            }
            S::ScriptDataEscapedEndTagName => self.step_raw_end_tag_name(cc, S::ScriptDataEscaped),
            S::ScriptDataDoubleEscapeStart => self.step_script_data_double_escape_start(cc),
            S::ScriptDataDoubleEscaped => self.step_script_data_double_escaped(cc),
            S::ScriptDataDoubleEscapedDash => self.step_script_data_double_escaped_dash(cc),
            S::ScriptDataDoubleEscapedDashDash => {
                self.step_script_data_double_escaped_dash_dash(cc)
            }
            S::ScriptDataDoubleEscapedLessThanSign => {
                self.step_script_data_double_escaped_less_than_sign(cc)
            }
            S::ScriptDataDoubleEscapeEnd => self.step_script_data_double_escape_end(cc),
            S::BeforeAttributeName => self.step_before_attribute_name(cc),
            S::AttributeName => self.step_attribute_name(cc),
            S::AfterAttributeName => self.step_after_attribute_name(cc),
            S::BeforeAttributeValue => self.step_before_attribute_value(cc),
            S::AttributeValueDoubleQuoted => self.step_attribute_value_quoted(cc, '"'),
            S::AttributeValueSingleQuoted => self.step_attribute_value_quoted(cc, '\''),
            S::AttributeValueUnquoted => self.step_attribute_value_unquoted(cc),
            S::AfterAttributeValueQuoted => self.step_after_attribute_value_quoted(cc),
            S::SelfClosingStartTag => self.step_self_closing_start_tag(cc),
            S::BogusComment => self.step_bogus_comment(cc),
            S::MarkupDeclarationOpen => self.step_markup_declaration_open(cc, input),
            S::CommentStart => self.step_comment_start(cc),
            S::CommentStartDash => self.step_comment_start_dash(cc),
            S::Comment => self.step_comment(cc),
            S::CommentLessThanSign => self.step_comment_less_than_sign(cc),
            S::CommentLessThanSignBang => self.step_comment_less_than_sign_bang(cc),
            S::CommentLessThanSignBangDash => self.step_comment_less_than_sign_bang_dash(cc),
            S::CommentLessThanSignBangDashDash => {
                self.step_comment_less_than_sign_bang_dash_dash(cc)
            }
            S::CommentEndDash => self.step_comment_end_dash(cc),
            S::CommentEnd => self.step_comment_end(cc),
            S::CommentEndBang => self.step_comment_end_bang(cc),
            S::Doctype => self.step_doctype(cc),
            S::BeforeDoctypeName => self.step_before_doctype_name(cc),
            S::DoctypeName => self.step_doctype_name(cc),
            S::AfterDoctypeName => self.step_after_doctype_name(cc, input),
            S::AfterDoctypePublicKeyword => self.step_after_doctype_public_keyword(cc),
            S::BeforeDoctypePublicIdentifier => self.step_before_doctype_public_identifier(cc),
            S::DoctypePublicIdentifierDoubleQuoted => {
                self.step_doctype_public_identifier_quoted(cc, '"')
            }
            S::DoctypePublicIdentifierSingleQuoted => {
                self.step_doctype_public_identifier_quoted(cc, '\'')
            }
            S::AfterDoctypePublicIdentifier => self.step_after_doctype_public_identifier(cc),
            S::BetweenDoctypePublicAndSystemIdentifiers => {
                self.step_between_doctype_public_and_system_identifiers(cc)
            }
            S::AfterDoctypeSystemKeyword => self.step_after_doctype_system_keyword(cc),
            S::BeforeDoctypeSystemIdentifier => self.step_before_doctype_system_identifier(cc),
            S::DoctypeSystemIdentifierDoubleQuoted => {
                self.step_doctype_system_identifier_quoted(cc, '"')
            }
            S::DoctypeSystemIdentifierSingleQuoted => {
                self.step_doctype_system_identifier_quoted(cc, '\'')
            }
            S::AfterDoctypeSystemIdentifier => self.step_after_doctype_system_identifier(cc),
            S::BogusDoctype => self.step_bogus_doctype(cc),
            S::CdataSection => self.step_cdata_section(cc),
            S::CdataSectionBracket => self.step_cdata_section_bracket(cc),
            S::CdataSectionEnd => self.step_cdata_section_end(cc),
            S::CharacterReference => self.step_character_reference(cc),
            S::NamedCharacterReference => self.step_named_character_reference(cc, input),
            S::AmbiguousAmpersand => self.step_ambiguous_ampersand(cc),
            S::NumericCharacterReference => self.step_numeric_character_reference(cc),
            S::HexadecimalCharacterReferenceStart => {
                self.step_hexadecimal_character_reference_start(cc)
            }
            S::DecimalCharacterReferenceStart => self.step_decimal_character_reference_start(cc),
            S::HexadecimalCharacterReference => self.step_hexadecimal_character_reference(cc),
            S::DecimalCharacterReference => self.step_decimal_character_reference(cc),
        }
    }

    // ---- text modes ------------------------------------------------------

    fn append_plain_run(&mut self, input: &mut Preprocessor, stop_amp: bool) {
        let run = input.consume_plain_run(stop_amp);
        if run.is_empty() {
            return;
        }
        // The run may mix whitespace and ordinary characters; kind splitting
        // happens per character.
        let run = run.to_owned();
        for c in run.chars() {
            self.append_char(c);
        }
    }

    fn step_data(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some('&') => {
                self.return_state = TokenizerState::Data;
                self.transition_to(TokenizerState::CharacterReference);
            }
            Some('<') => self.transition_to(TokenizerState::TagOpen),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\0');
            }
            None => self.emit_eof(),
            Some(c) => {
                self.append_char(c);
                self.append_plain_run(input, true);
            }
        }
    }

    fn step_rcdata(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some('&') => {
                self.return_state = TokenizerState::Rcdata;
                self.transition_to(TokenizerState::CharacterReference);
            }
            Some('<') => self.transition_to(TokenizerState::RcdataLessThanSign),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
            }
            None => self.emit_eof(),
            Some(c) => {
                self.append_char(c);
                self.append_plain_run(input, true);
            }
        }
    }

    fn step_rawtext(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some('<') => self.transition_to(TokenizerState::RawtextLessThanSign),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
            }
            None => self.emit_eof(),
            Some(c) => {
                self.append_char(c);
                self.append_plain_run(input, false);
            }
        }
    }

    fn step_script_data(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some('<') => self.transition_to(TokenizerState::ScriptDataLessThanSign),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
            }
            None => self.emit_eof(),
            Some(c) => {
                self.append_char(c);
                self.append_plain_run(input, false);
            }
        }
    }

    fn step_plaintext(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
            }
            None => self.emit_eof(),
            Some(c) => {
                self.append_char(c);
                self.append_plain_run(input, false);
            }
        }
    }

    // ---- tag states ------------------------------------------------------

    fn step_tag_open(&mut self, cc: Option<char>) {
        match cc {
            Some('!') => self.transition_to(TokenizerState::MarkupDeclarationOpen),
            Some('/') => self.transition_to(TokenizerState::EndTagOpen),
            Some(c) if c.is_ascii_alphabetic() => {
                self.create_tag(false);
                self.reconsume_in(TokenizerState::TagName);
            }
            Some('?') => {
                self.err(ParseErrorCode::UnexpectedQuestionMarkInsteadOfTagName);
                self.current_comment.clear();
                self.reconsume_in(TokenizerState::BogusComment);
            }
            None => {
                self.err(ParseErrorCode::EofBeforeTagName);
                self.append_char('<');
                self.emit_eof();
            }
            Some(_) => {
                self.err(ParseErrorCode::InvalidFirstCharacterOfTagName);
                self.append_char('<');
                self.reconsume_in(TokenizerState::Data);
            }
        }
    }

    fn step_end_tag_open(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if c.is_ascii_alphabetic() => {
                self.create_tag(true);
                self.reconsume_in(TokenizerState::TagName);
            }
            Some('>') => {
                self.err(ParseErrorCode::MissingEndTagName);
                self.transition_to(TokenizerState::Data);
            }
            None => {
                self.err(ParseErrorCode::EofBeforeTagName);
                self.append_char('<');
                self.append_char('/');
                self.emit_eof();
            }
            Some(_) => {
                self.err(ParseErrorCode::InvalidFirstCharacterOfTagName);
                self.current_comment.clear();
                self.reconsume_in(TokenizerState::BogusComment);
            }
        }
    }

    fn step_tag_name(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => self.transition_to(TokenizerState::BeforeAttributeName),
            Some('/') => self.transition_to(TokenizerState::SelfClosingStartTag),
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_to_tag_name('\u{FFFD}');
            }
            None => {
                self.err(ParseErrorCode::EofInTag);
                self.emit_eof();
            }
            Some(c) => self.append_to_tag_name(c),
        }
    }

    // ---- RCDATA/RAWTEXT/script end-tag scanning --------------------------

    fn step_raw_less_than_sign(
        &mut self,
        cc: Option<char>,
        fallback: TokenizerState,
        end_tag_open: TokenizerState,
    ) {
        match cc {
            Some('/') => {
                self.temp_buffer.clear();
                self.transition_to(end_tag_open);
            }
            _ => {
                self.append_char('<');
                self.reconsume_in(fallback);
            }
        }
    }

    fn step_raw_end_tag_open(
        &mut self,
        cc: Option<char>,
        fallback: TokenizerState,
        end_tag_name: TokenizerState,
    ) {
        match cc {
            Some(c) if c.is_ascii_alphabetic() => {
                self.create_tag(true);
                self.reconsume_in(end_tag_name);
            }
            _ => {
                self.append_char('<');
                self.append_char('/');
                self.reconsume_in(fallback);
            }
        }
    }

    /// Shared end-tag-name handling for RCDATA, RAWTEXT, script data, and
    /// escaped script data. Only an appropriate end tag (matching the last
    /// emitted start tag) terminates the special mode; anything else replays
    /// the scanned text literally.
    fn step_raw_end_tag_name(&mut self, cc: Option<char>, fallback: TokenizerState) {
        match cc {
            Some(c) if is_ws(c) && self.is_appropriate_end_tag() => {
                self.transition_to(TokenizerState::BeforeAttributeName);
            }
            Some('/') if self.is_appropriate_end_tag() => {
                self.transition_to(TokenizerState::SelfClosingStartTag);
            }
            Some('>') if self.is_appropriate_end_tag() => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.append_to_tag_name(c);
                self.temp_buffer.push(c);
            }
            _ => {
                self.current_tag = None;
                self.append_char('<');
                self.append_char('/');
                let temp = std::mem::take(&mut self.temp_buffer);
                for c in temp.chars() {
                    self.append_char(c);
                }
                self.reconsume_in(fallback);
            }
        }
    }

    fn step_script_data_less_than_sign(&mut self, cc: Option<char>) {
        match cc {
            Some('/') => {
                self.temp_buffer.clear();
                self.transition_to(TokenizerState::ScriptDataEndTagOpen);
            }
            Some('!') => {
                self.transition_to(TokenizerState::ScriptDataEscapeStart);
                self.append_char('<');
                self.append_char('!');
            }
            _ => {
                self.append_char('<');
                self.reconsume_in(TokenizerState::ScriptData);
            }
        }
    }

    fn step_script_data_escape_start(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.transition_to(TokenizerState::ScriptDataEscapeStartDash);
                self.append_char('-');
            }
            _ => self.reconsume_in(TokenizerState::ScriptData),
        }
    }

    fn step_script_data_escape_start_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.transition_to(TokenizerState::ScriptDataEscapedDashDash);
                self.append_char('-');
            }
            _ => self.reconsume_in(TokenizerState::ScriptData),
        }
    }

    fn step_script_data_escaped(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.transition_to(TokenizerState::ScriptDataEscapedDash);
                self.append_char('-');
            }
            Some('<') => self.transition_to(TokenizerState::ScriptDataEscapedLessThanSign),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
            }
            None => {
                self.err(ParseErrorCode::EofInScriptHtmlCommentLikeText);
                self.emit_eof();
            }
            Some(c) => self.append_char(c),
        }
    }

    fn step_script_data_escaped_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.transition_to(TokenizerState::ScriptDataEscapedDashDash);
                self.append_char('-');
            }
            Some('<') => self.transition_to(TokenizerState::ScriptDataEscapedLessThanSign),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
                self.transition_to(TokenizerState::ScriptDataEscaped);
            }
            None => {
                self.err(ParseErrorCode::EofInScriptHtmlCommentLikeText);
                self.emit_eof();
            }
            Some(c) => {
                self.append_char(c);
                self.transition_to(TokenizerState::ScriptDataEscaped);
            }
        }
    }

    fn step_script_data_escaped_dash_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.append_char('-'),
            Some('<') => self.transition_to(TokenizerState::ScriptDataEscapedLessThanSign),
            Some('>') => {
                self.append_char('>');
                self.transition_to(TokenizerState::ScriptData);
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
                self.transition_to(TokenizerState::ScriptDataEscaped);
            }
            None => {
                self.err(ParseErrorCode::EofInScriptHtmlCommentLikeText);
                self.emit_eof();
            }
            Some(c) => {
                self.append_char(c);
                self.transition_to(TokenizerState::ScriptDataEscaped);
            }
        }
    }

    fn step_script_data_escaped_less_than_sign(&mut self, cc: Option<char>) {
        match cc {
            Some('/') => {
                self.temp_buffer.clear();
                self.transition_to(TokenizerState::ScriptDataEscapedEndTagOpen);
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.temp_buffer.clear();
                self.append_char('<');
                self.reconsume_in(TokenizerState::ScriptDataDoubleEscapeStart);
            }
            _ => {
                self.append_char('<');
                self.reconsume_in(TokenizerState::ScriptDataEscaped);
            }
        }
    }

    fn step_script_data_double_escape_start(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) || c == '/' || c == '>' => {
                let next = if self.temp_buffer == "script" {
                    TokenizerState::ScriptDataDoubleEscaped
                } else {
                    TokenizerState::ScriptDataEscaped
                };
                self.append_char(c);
                self.transition_to(next);
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.temp_buffer.push(c.to_ascii_lowercase());
                self.append_char(c);
            }
            _ => self.reconsume_in(TokenizerState::ScriptDataEscaped),
        }
    }

    fn step_script_data_double_escaped(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.transition_to(TokenizerState::ScriptDataDoubleEscapedDash);
                self.append_char('-');
            }
            Some('<') => {
                self.transition_to(TokenizerState::ScriptDataDoubleEscapedLessThanSign);
                self.append_char('<');
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
            }
            None => {
                self.err(ParseErrorCode::EofInScriptHtmlCommentLikeText);
                self.emit_eof();
            }
            Some(c) => self.append_char(c),
        }
    }

    fn step_script_data_double_escaped_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.transition_to(TokenizerState::ScriptDataDoubleEscapedDashDash);
                self.append_char('-');
            }
            Some('<') => {
                self.transition_to(TokenizerState::ScriptDataDoubleEscapedLessThanSign);
                self.append_char('<');
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
                self.transition_to(TokenizerState::ScriptDataDoubleEscaped);
            }
            None => {
                self.err(ParseErrorCode::EofInScriptHtmlCommentLikeText);
                self.emit_eof();
            }
            Some(c) => {
                self.append_char(c);
                self.transition_to(TokenizerState::ScriptDataDoubleEscaped);
            }
        }
    }

    fn step_script_data_double_escaped_dash_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.append_char('-'),
            Some('<') => {
                self.transition_to(TokenizerState::ScriptDataDoubleEscapedLessThanSign);
                self.append_char('<');
            }
            Some('>') => {
                self.append_char('>');
                self.transition_to(TokenizerState::ScriptData);
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.append_char('\u{FFFD}');
                self.transition_to(TokenizerState::ScriptDataDoubleEscaped);
            }
            None => {
                self.err(ParseErrorCode::EofInScriptHtmlCommentLikeText);
                self.emit_eof();
            }
            Some(c) => {
                self.append_char(c);
                self.transition_to(TokenizerState::ScriptDataDoubleEscaped);
            }
        }
    }

    fn step_script_data_double_escaped_less_than_sign(&mut self, cc: Option<char>) {
        match cc {
            Some('/') => {
                self.temp_buffer.clear();
                self.append_char('/');
                self.transition_to(TokenizerState::ScriptDataDoubleEscapeEnd);
            }
            _ => self.reconsume_in(TokenizerState::ScriptDataDoubleEscaped),
        }
    }

    fn step_script_data_double_escape_end(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) || c == '/' || c == '>' => {
                let next = if self.temp_buffer == "script" {
                    TokenizerState::ScriptDataEscaped
                } else {
                    TokenizerState::ScriptDataDoubleEscaped
                };
                self.append_char(c);
                self.transition_to(next);
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.temp_buffer.push(c.to_ascii_lowercase());
                self.append_char(c);
            }
            _ => self.reconsume_in(TokenizerState::ScriptDataDoubleEscaped),
        }
    }

    // ---- attribute states ------------------------------------------------

    fn step_before_attribute_name(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('/') | Some('>') | None => self.reconsume_in(TokenizerState::AfterAttributeName),
            Some('=') => {
                self.err(ParseErrorCode::UnexpectedEqualsSignBeforeAttributeName);
                self.start_new_attribute();
                self.current_attr_name.push('=');
                self.transition_to(TokenizerState::AttributeName);
            }
            Some(_) => {
                self.start_new_attribute();
                self.reconsume_in(TokenizerState::AttributeName);
            }
        }
    }

    fn step_attribute_name(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => self.reconsume_in(TokenizerState::AfterAttributeName),
            Some('/') | Some('>') | None => self.reconsume_in(TokenizerState::AfterAttributeName),
            Some('=') => self.transition_to(TokenizerState::BeforeAttributeValue),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.current_attr_name.push('\u{FFFD}');
            }
            Some(c @ ('"' | '\'' | '<')) => {
                self.err(ParseErrorCode::UnexpectedCharacterInAttributeName);
                self.current_attr_name.push(c);
            }
            Some(c) => self.current_attr_name.push(c.to_ascii_lowercase()),
        }
    }

    fn step_after_attribute_name(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('/') => self.transition_to(TokenizerState::SelfClosingStartTag),
            Some('=') => self.transition_to(TokenizerState::BeforeAttributeValue),
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            None => {
                self.err(ParseErrorCode::EofInTag);
                self.emit_eof();
            }
            Some(_) => {
                self.start_new_attribute();
                self.reconsume_in(TokenizerState::AttributeName);
            }
        }
    }

    fn step_before_attribute_value(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('"') => self.transition_to(TokenizerState::AttributeValueDoubleQuoted),
            Some('\'') => self.transition_to(TokenizerState::AttributeValueSingleQuoted),
            Some('>') => {
                self.err(ParseErrorCode::MissingAttributeValue);
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            _ => self.reconsume_in(TokenizerState::AttributeValueUnquoted),
        }
    }

    fn step_attribute_value_quoted(&mut self, cc: Option<char>, quote: char) {
        let this_state = if quote == '"' {
            TokenizerState::AttributeValueDoubleQuoted
        } else {
            TokenizerState::AttributeValueSingleQuoted
        };
        match cc {
            Some(c) if c == quote => self.transition_to(TokenizerState::AfterAttributeValueQuoted),
            Some('&') => {
                self.return_state = this_state;
                self.transition_to(TokenizerState::CharacterReference);
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.current_attr_value.push('\u{FFFD}');
            }
            None => {
                self.err(ParseErrorCode::EofInTag);
                self.emit_eof();
            }
            Some(c) => self.current_attr_value.push(c),
        }
    }

    fn step_attribute_value_unquoted(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => self.transition_to(TokenizerState::BeforeAttributeName),
            Some('&') => {
                self.return_state = TokenizerState::AttributeValueUnquoted;
                self.transition_to(TokenizerState::CharacterReference);
            }
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.current_attr_value.push('\u{FFFD}');
            }
            Some(c @ ('"' | '\'' | '<' | '=' | '`')) => {
                self.err(ParseErrorCode::UnexpectedCharacterInUnquotedAttributeValue);
                self.current_attr_value.push(c);
            }
            None => {
                self.err(ParseErrorCode::EofInTag);
                self.emit_eof();
            }
            Some(c) => self.current_attr_value.push(c),
        }
    }

    fn step_after_attribute_value_quoted(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => self.transition_to(TokenizerState::BeforeAttributeName),
            Some('/') => self.transition_to(TokenizerState::SelfClosingStartTag),
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            None => {
                self.err(ParseErrorCode::EofInTag);
                self.emit_eof();
            }
            Some(_) => {
                self.err(ParseErrorCode::MissingWhitespaceBetweenAttributes);
                self.reconsume_in(TokenizerState::BeforeAttributeName);
            }
        }
    }

    fn step_self_closing_start_tag(&mut self, cc: Option<char>) {
        match cc {
            Some('>') => {
                if let Some(tag) = self.current_tag.as_mut() {
                    tag.self_closing = true;
                }
                self.transition_to(TokenizerState::Data);
                self.emit_current_tag();
            }
            None => {
                self.err(ParseErrorCode::EofInTag);
                self.emit_eof();
            }
            Some(_) => {
                self.err(ParseErrorCode::UnexpectedSolidusInTag);
                self.reconsume_in(TokenizerState::BeforeAttributeName);
            }
        }
    }

    // ---- comment states --------------------------------------------------

    fn step_bogus_comment(&mut self, cc: Option<char>) {
        match cc {
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_comment();
            }
            None => {
                self.emit_current_comment();
                self.emit_eof();
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.current_comment.push('\u{FFFD}');
            }
            Some(c) => self.current_comment.push(c),
        }
    }

    fn step_markup_declaration_open(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some('-') => match self.consume_sequence_if_match(input, b"-", false) {
                SeqMatch::Matched => {
                    self.current_comment.clear();
                    self.transition_to(TokenizerState::CommentStart);
                }
                SeqMatch::NeedMoreInput => self.hibernate(input),
                SeqMatch::NotMatched => self.bogus_markup_declaration(),
            },
            Some('d') | Some('D') => match self.consume_sequence_if_match(input, b"OCTYPE", true) {
                SeqMatch::Matched => self.transition_to(TokenizerState::Doctype),
                SeqMatch::NeedMoreInput => self.hibernate(input),
                SeqMatch::NotMatched => self.bogus_markup_declaration(),
            },
            Some('[') => match self.consume_sequence_if_match(input, b"CDATA[", false) {
                SeqMatch::Matched => {
                    if self.allow_cdata {
                        self.transition_to(TokenizerState::CdataSection);
                    } else {
                        self.err(ParseErrorCode::CdataInHtmlContent);
                        self.current_comment.clear();
                        self.current_comment.push_str("[CDATA[");
                        self.transition_to(TokenizerState::BogusComment);
                    }
                }
                SeqMatch::NeedMoreInput => self.hibernate(input),
                SeqMatch::NotMatched => self.bogus_markup_declaration(),
            },
            _ => self.bogus_markup_declaration(),
        }
    }

    fn bogus_markup_declaration(&mut self) {
        self.err(ParseErrorCode::IncorrectlyOpenedComment);
        self.current_comment.clear();
        self.reconsume_in(TokenizerState::BogusComment);
    }

    fn step_comment_start(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.transition_to(TokenizerState::CommentStartDash),
            Some('>') => {
                self.err(ParseErrorCode::AbruptClosingOfEmptyComment);
                self.transition_to(TokenizerState::Data);
                self.emit_current_comment();
            }
            _ => self.reconsume_in(TokenizerState::Comment),
        }
    }

    fn step_comment_start_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.transition_to(TokenizerState::CommentEnd),
            Some('>') => {
                self.err(ParseErrorCode::AbruptClosingOfEmptyComment);
                self.transition_to(TokenizerState::Data);
                self.emit_current_comment();
            }
            None => {
                self.err(ParseErrorCode::EofInComment);
                self.emit_current_comment();
                self.emit_eof();
            }
            Some(_) => {
                self.current_comment.push('-');
                self.reconsume_in(TokenizerState::Comment);
            }
        }
    }

    fn step_comment(&mut self, cc: Option<char>) {
        match cc {
            Some('<') => {
                self.current_comment.push('<');
                self.transition_to(TokenizerState::CommentLessThanSign);
            }
            Some('-') => self.transition_to(TokenizerState::CommentEndDash),
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.current_comment.push('\u{FFFD}');
            }
            None => {
                self.err(ParseErrorCode::EofInComment);
                self.emit_current_comment();
                self.emit_eof();
            }
            Some(c) => self.current_comment.push(c),
        }
    }

    fn step_comment_less_than_sign(&mut self, cc: Option<char>) {
        match cc {
            Some('!') => {
                self.current_comment.push('!');
                self.transition_to(TokenizerState::CommentLessThanSignBang);
            }
            Some('<') => self.current_comment.push('<'),
            _ => self.reconsume_in(TokenizerState::Comment),
        }
    }

    fn step_comment_less_than_sign_bang(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.transition_to(TokenizerState::CommentLessThanSignBangDash),
            _ => self.reconsume_in(TokenizerState::Comment),
        }
    }

    fn step_comment_less_than_sign_bang_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.transition_to(TokenizerState::CommentLessThanSignBangDashDash),
            _ => self.reconsume_in(TokenizerState::CommentEndDash),
        }
    }

    fn step_comment_less_than_sign_bang_dash_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('>') | None => self.reconsume_in(TokenizerState::CommentEnd),
            Some(_) => {
                self.err(ParseErrorCode::NestedComment);
                self.reconsume_in(TokenizerState::CommentEnd);
            }
        }
    }

    fn step_comment_end_dash(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => self.transition_to(TokenizerState::CommentEnd),
            None => {
                self.err(ParseErrorCode::EofInComment);
                self.emit_current_comment();
                self.emit_eof();
            }
            Some(_) => {
                self.current_comment.push('-');
                self.reconsume_in(TokenizerState::Comment);
            }
        }
    }

    fn step_comment_end(&mut self, cc: Option<char>) {
        match cc {
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_comment();
            }
            Some('!') => self.transition_to(TokenizerState::CommentEndBang),
            Some('-') => self.current_comment.push('-'),
            None => {
                self.err(ParseErrorCode::EofInComment);
                self.emit_current_comment();
                self.emit_eof();
            }
            Some(_) => {
                self.current_comment.push_str("--");
                self.reconsume_in(TokenizerState::Comment);
            }
        }
    }

    fn step_comment_end_bang(&mut self, cc: Option<char>) {
        match cc {
            Some('-') => {
                self.current_comment.push_str("--!");
                self.transition_to(TokenizerState::CommentEndDash);
            }
            Some('>') => {
                self.err(ParseErrorCode::IncorrectlyClosedComment);
                self.transition_to(TokenizerState::Data);
                self.emit_current_comment();
            }
            None => {
                self.err(ParseErrorCode::EofInComment);
                self.emit_current_comment();
                self.emit_eof();
            }
            Some(_) => {
                self.current_comment.push_str("--!");
                self.reconsume_in(TokenizerState::Comment);
            }
        }
    }

    // ---- doctype states --------------------------------------------------

    fn step_doctype(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => self.transition_to(TokenizerState::BeforeDoctypeName),
            Some('>') => self.reconsume_in(TokenizerState::BeforeDoctypeName),
            None => {
                self.err(ParseErrorCode::EofInDoctype);
                self.create_doctype();
                self.doctype_mut().force_quirks = true;
                self.emit_current_doctype();
                self.emit_eof();
            }
            Some(_) => {
                self.err(ParseErrorCode::MissingWhitespaceBeforeDoctypeName);
                self.reconsume_in(TokenizerState::BeforeDoctypeName);
            }
        }
    }

    fn step_before_doctype_name(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                self.create_doctype();
                self.doctype_mut().name = Some('\u{FFFD}'.to_string());
                self.transition_to(TokenizerState::DoctypeName);
            }
            Some('>') => {
                self.err(ParseErrorCode::MissingDoctypeName);
                self.create_doctype();
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => {
                self.err(ParseErrorCode::EofInDoctype);
                self.create_doctype();
                self.doctype_mut().force_quirks = true;
                self.emit_current_doctype();
                self.emit_eof();
            }
            Some(c) => {
                self.create_doctype();
                self.doctype_mut().name = Some(c.to_ascii_lowercase().to_string());
                self.transition_to(TokenizerState::DoctypeName);
            }
        }
    }

    fn step_doctype_name(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => self.transition_to(TokenizerState::AfterDoctypeName),
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                if let Some(name) = self.doctype_mut().name.as_mut() {
                    name.push('\u{FFFD}');
                }
            }
            None => self.eof_in_doctype(),
            Some(c) => {
                let folded = c.to_ascii_lowercase();
                if let Some(name) = self.doctype_mut().name.as_mut() {
                    name.push(folded);
                }
            }
        }
    }

    fn step_after_doctype_name(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some('p') | Some('P') => match self.consume_sequence_if_match(input, b"UBLIC", true) {
                SeqMatch::Matched => self.transition_to(TokenizerState::AfterDoctypePublicKeyword),
                SeqMatch::NeedMoreInput => self.hibernate(input),
                SeqMatch::NotMatched => self.bogus_after_doctype_name(),
            },
            Some('s') | Some('S') => match self.consume_sequence_if_match(input, b"YSTEM", true) {
                SeqMatch::Matched => self.transition_to(TokenizerState::AfterDoctypeSystemKeyword),
                SeqMatch::NeedMoreInput => self.hibernate(input),
                SeqMatch::NotMatched => self.bogus_after_doctype_name(),
            },
            Some(_) => self.bogus_after_doctype_name(),
        }
    }

    fn bogus_after_doctype_name(&mut self) {
        self.err(ParseErrorCode::InvalidCharacterSequenceAfterDoctypeName);
        self.doctype_mut().force_quirks = true;
        self.reconsume_in(TokenizerState::BogusDoctype);
    }

    fn step_after_doctype_public_keyword(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {
                self.transition_to(TokenizerState::BeforeDoctypePublicIdentifier)
            }
            Some('"') => {
                self.err(ParseErrorCode::MissingWhitespaceAfterDoctypeKeyword);
                self.doctype_mut().public_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypePublicIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.err(ParseErrorCode::MissingWhitespaceAfterDoctypeKeyword);
                self.doctype_mut().public_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypePublicIdentifierSingleQuoted);
            }
            Some('>') => {
                self.err(ParseErrorCode::MissingDoctypePublicIdentifier);
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::MissingQuoteBeforeDoctypeIdentifier);
                self.doctype_mut().force_quirks = true;
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_before_doctype_public_identifier(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('"') => {
                self.doctype_mut().public_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypePublicIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.doctype_mut().public_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypePublicIdentifierSingleQuoted);
            }
            Some('>') => {
                self.err(ParseErrorCode::MissingDoctypePublicIdentifier);
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::MissingQuoteBeforeDoctypeIdentifier);
                self.doctype_mut().force_quirks = true;
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_doctype_public_identifier_quoted(&mut self, cc: Option<char>, quote: char) {
        match cc {
            Some(c) if c == quote => {
                self.transition_to(TokenizerState::AfterDoctypePublicIdentifier)
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                if let Some(id) = self.doctype_mut().public_id.as_mut() {
                    id.push('\u{FFFD}');
                }
            }
            Some('>') => {
                self.err(ParseErrorCode::AbruptDoctypePublicIdentifier);
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(c) => {
                if let Some(id) = self.doctype_mut().public_id.as_mut() {
                    id.push(c);
                }
            }
        }
    }

    fn step_after_doctype_public_identifier(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {
                self.transition_to(TokenizerState::BetweenDoctypePublicAndSystemIdentifiers)
            }
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            Some('"') => {
                self.err(ParseErrorCode::MissingWhitespaceBetweenDoctypeIdentifiers);
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.err(ParseErrorCode::MissingWhitespaceBetweenDoctypeIdentifiers);
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierSingleQuoted);
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::MissingQuoteBeforeDoctypeIdentifier);
                self.doctype_mut().force_quirks = true;
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_between_doctype_public_and_system_identifiers(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            Some('"') => {
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierSingleQuoted);
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::MissingQuoteBeforeDoctypeIdentifier);
                self.doctype_mut().force_quirks = true;
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_after_doctype_system_keyword(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {
                self.transition_to(TokenizerState::BeforeDoctypeSystemIdentifier)
            }
            Some('"') => {
                self.err(ParseErrorCode::MissingWhitespaceAfterDoctypeKeyword);
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.err(ParseErrorCode::MissingWhitespaceAfterDoctypeKeyword);
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierSingleQuoted);
            }
            Some('>') => {
                self.err(ParseErrorCode::MissingDoctypeSystemIdentifier);
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::MissingQuoteBeforeDoctypeIdentifier);
                self.doctype_mut().force_quirks = true;
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_before_doctype_system_identifier(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('"') => {
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.doctype_mut().system_id = Some(String::new());
                self.transition_to(TokenizerState::DoctypeSystemIdentifierSingleQuoted);
            }
            Some('>') => {
                self.err(ParseErrorCode::MissingDoctypeSystemIdentifier);
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::MissingQuoteBeforeDoctypeIdentifier);
                self.doctype_mut().force_quirks = true;
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_doctype_system_identifier_quoted(&mut self, cc: Option<char>, quote: char) {
        match cc {
            Some(c) if c == quote => {
                self.transition_to(TokenizerState::AfterDoctypeSystemIdentifier)
            }
            Some('\0') => {
                self.err(ParseErrorCode::UnexpectedNullCharacter);
                if let Some(id) = self.doctype_mut().system_id.as_mut() {
                    id.push('\u{FFFD}');
                }
            }
            Some('>') => {
                self.err(ParseErrorCode::AbruptDoctypeSystemIdentifier);
                self.doctype_mut().force_quirks = true;
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(c) => {
                if let Some(id) = self.doctype_mut().system_id.as_mut() {
                    id.push(c);
                }
            }
        }
    }

    fn step_after_doctype_system_identifier(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if is_ws(c) => {}
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            None => self.eof_in_doctype(),
            Some(_) => {
                self.err(ParseErrorCode::UnexpectedCharacterAfterDoctypeSystemIdentifier);
                // No force-quirks here; the identifiers are already complete.
                self.reconsume_in(TokenizerState::BogusDoctype);
            }
        }
    }

    fn step_bogus_doctype(&mut self, cc: Option<char>) {
        match cc {
            Some('>') => {
                self.transition_to(TokenizerState::Data);
                self.emit_current_doctype();
            }
            Some('\0') => self.err(ParseErrorCode::UnexpectedNullCharacter),
            None => {
                self.emit_current_doctype();
                self.emit_eof();
            }
            Some(_) => {}
        }
    }

    // ---- CDATA sections --------------------------------------------------

    fn step_cdata_section(&mut self, cc: Option<char>) {
        match cc {
            Some(']') => self.transition_to(TokenizerState::CdataSectionBracket),
            None => {
                self.err(ParseErrorCode::EofInCdata);
                self.emit_eof();
            }
            Some(c) => self.append_char(c),
        }
    }

    fn step_cdata_section_bracket(&mut self, cc: Option<char>) {
        match cc {
            Some(']') => self.transition_to(TokenizerState::CdataSectionEnd),
            _ => {
                self.append_char(']');
                self.reconsume_in(TokenizerState::CdataSection);
            }
        }
    }

    fn step_cdata_section_end(&mut self, cc: Option<char>) {
        match cc {
            Some(']') => self.append_char(']'),
            Some('>') => self.transition_to(TokenizerState::Data),
            _ => {
                self.append_char(']');
                self.append_char(']');
                self.reconsume_in(TokenizerState::CdataSection);
            }
        }
    }

    // ---- character-reference states --------------------------------------

    fn step_character_reference(&mut self, cc: Option<char>) {
        self.temp_buffer.clear();
        self.temp_buffer.push('&');
        match cc {
            Some(c) if c.is_ascii_alphanumeric() => {
                self.reconsume_in(TokenizerState::NamedCharacterReference);
            }
            Some('#') => {
                self.temp_buffer.push('#');
                self.transition_to(TokenizerState::NumericCharacterReference);
            }
            _ => {
                self.flush_char_ref_temp();
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
        }
    }

    /// Walk the entity table as a prefix tree, tracking the longest
    /// semicolon-terminated match and the longest match overall.
    fn step_named_character_reference(&mut self, cc: Option<char>, input: &mut Preprocessor) {
        let Some(first) = cc else {
            // Unreachable per the character-reference entry condition, but
            // recover to the return state rather than trusting it.
            let return_state = self.return_state;
            self.flush_char_ref_temp();
            self.reconsume_in(return_state);
            return;
        };

        let (mut lo, mut hi) = (0usize, entities::ENTITIES.len());
        let mut consumed_chars = vec![first];
        let mut best: Option<usize> = None;
        let mut matched_len = 0usize;
        let mut walked = 0usize;
        loop {
            let c = consumed_chars[walked];
            if !c.is_ascii() {
                break;
            }
            let (new_lo, new_hi) = entities::narrow(lo, hi, walked, c as u8);
            if new_lo >= new_hi {
                break;
            }
            lo = new_lo;
            hi = new_hi;
            walked += 1;
            if let Some(idx) = entities::exact_match(lo, hi, walked) {
                best = Some(idx);
                matched_len = walked;
                if entities::ENTITIES[idx].0.ends_with(';') {
                    break;
                }
            }
            match self.consume_raw(input) {
                Some(next) => consumed_chars.push(next),
                None => {
                    if input.end_of_chunk_hit() {
                        self.hibernate(input);
                        return;
                    }
                    break;
                }
            }
        }

        match best {
            Some(idx) => {
                let (name, replacement) = entities::ENTITIES[idx];
                let has_semicolon = name.ends_with(';');
                let next_char = consumed_chars.get(matched_len).copied();
                let blocked = self.char_ref_in_attribute()
                    && !has_semicolon
                    && next_char.is_some_and(|c| c == '=' || c.is_ascii_alphanumeric());
                self.retreat_here(input, consumed_chars.len() - matched_len);
                if blocked {
                    // Historical rule: inside an attribute value, a legacy
                    // reference followed by `=` or an alphanumeric stays
                    // literal text.
                    for c in &consumed_chars[..matched_len] {
                        self.temp_buffer.push(*c);
                    }
                } else {
                    if !has_semicolon {
                        self.err(ParseErrorCode::MissingSemicolonAfterCharacterReference);
                    }
                    self.temp_buffer.clear();
                    self.temp_buffer.push_str(replacement);
                }
                self.flush_char_ref_temp();
                let return_state = self.return_state;
                self.transition_to(return_state);
            }
            None => {
                // No full match: the walked prefix stays consumed as literal
                // text, the failing character is replayed.
                self.retreat_here(input, consumed_chars.len() - walked);
                for c in &consumed_chars[..walked] {
                    self.temp_buffer.push(*c);
                }
                self.flush_char_ref_temp();
                self.transition_to(TokenizerState::AmbiguousAmpersand);
            }
        }
    }

    fn step_ambiguous_ampersand(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if c.is_ascii_alphanumeric() => {
                if self.char_ref_in_attribute() {
                    self.current_attr_value.push(c);
                } else {
                    self.append_char(c);
                }
            }
            Some(';') => {
                self.err(ParseErrorCode::UnknownNamedCharacterReference);
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
            _ => {
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
        }
    }

    fn step_numeric_character_reference(&mut self, cc: Option<char>) {
        self.char_ref_code = 0;
        match cc {
            Some(c @ ('x' | 'X')) => {
                self.temp_buffer.push(c);
                self.transition_to(TokenizerState::HexadecimalCharacterReferenceStart);
            }
            _ => self.reconsume_in(TokenizerState::DecimalCharacterReferenceStart),
        }
    }

    fn step_hexadecimal_character_reference_start(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if c.is_ascii_hexdigit() => {
                self.reconsume_in(TokenizerState::HexadecimalCharacterReference);
            }
            _ => {
                self.err(ParseErrorCode::AbsenceOfDigitsInNumericCharacterReference);
                self.flush_char_ref_temp();
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
        }
    }

    fn step_decimal_character_reference_start(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if c.is_ascii_digit() => {
                self.reconsume_in(TokenizerState::DecimalCharacterReference);
            }
            _ => {
                self.err(ParseErrorCode::AbsenceOfDigitsInNumericCharacterReference);
                self.flush_char_ref_temp();
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
        }
    }

    fn step_hexadecimal_character_reference(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if c.is_ascii_hexdigit() => {
                let digit = c.to_digit(16).unwrap_or(0);
                self.char_ref_code = self.char_ref_code.saturating_mul(16).saturating_add(digit);
            }
            Some(';') => {
                self.apply_numeric_reference();
                let return_state = self.return_state;
                self.transition_to(return_state);
            }
            _ => {
                self.err(ParseErrorCode::MissingSemicolonAfterCharacterReference);
                self.apply_numeric_reference();
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
        }
    }

    fn step_decimal_character_reference(&mut self, cc: Option<char>) {
        match cc {
            Some(c) if c.is_ascii_digit() => {
                let digit = c.to_digit(10).unwrap_or(0);
                self.char_ref_code = self.char_ref_code.saturating_mul(10).saturating_add(digit);
            }
            Some(';') => {
                self.apply_numeric_reference();
                let return_state = self.return_state;
                self.transition_to(return_state);
            }
            _ => {
                self.err(ParseErrorCode::MissingSemicolonAfterCharacterReference);
                self.apply_numeric_reference();
                let return_state = self.return_state;
                self.reconsume_in(return_state);
            }
        }
    }
}
