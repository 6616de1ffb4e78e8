//! Standards-conformant HTML5 parsing: a streaming tokenizer and the
//! tree-construction state machine, wired to a host-supplied `TreeSink`.
//!
//! The two machines form one pull-driven loop: the parser asks the tokenizer
//! for the next token, which itself loops over code points until a token is
//! ready or the preprocessor reports a chunk boundary. Streaming input
//! suspends via hibernation (state is byte-for-byte resumable) and resumes on
//! the next `write`. There is no rejection path for malformed input; every
//! construct has a defined recovery, and the only hard failures are engine
//! invariant violations at the sink boundary.

mod doctype;
mod entities;
mod error;
mod preprocessor;
mod sink;
mod tags;
mod token;
pub mod tokenizer;
mod tree_builder;

pub use crate::doctype::document_mode;
pub use crate::error::{ParseError, ParseErrorCode};
pub use crate::preprocessor::Preprocessor;
pub use crate::sink::{DocumentMode, ElemName, EngineInvariantError, Namespace, TreeSink};
pub use crate::token::{Attribute, CharacterKind, DoctypeToken, TagToken, Token};
pub use crate::tokenizer::{Tokenizer, TokenizerConfig, TokenizerState};

use crate::tree_builder::TreeBuilder;

/// Configuration for a parse.
#[derive(Clone, Copy, Debug)]
pub struct ParserConfig {
    /// Whether scripting is considered enabled; selects the `<noscript>`
    /// parsing rules. Script contents are never executed either way.
    pub scripting_enabled: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            scripting_enabled: true,
        }
    }
}

/// Streaming parser: one preprocessor, one tokenizer, one tree builder.
///
/// Feed input with `write(chunk, is_last)`; the parse advances as far as the
/// buffered input allows and suspends until the next chunk. Each instance owns
/// all of its state; nothing is shared across concurrent parses except the
/// static character-reference table.
pub struct Parser<S: TreeSink> {
    preprocessor: Preprocessor,
    tokenizer: Tokenizer,
    builder: TreeBuilder<S>,
}

impl<S: TreeSink> Parser<S> {
    pub fn new(sink: S, config: ParserConfig) -> Self {
        Self {
            preprocessor: Preprocessor::new(),
            tokenizer: Tokenizer::new(TokenizerConfig::default()),
            builder: TreeBuilder::new(sink, config),
        }
    }

    /// Fragment parsing: `context` is the sink element the fragment is being
    /// parsed for. The tokenizer starts in the state the context's tag
    /// dictates, and a `<template>` context seeds the template-mode stack.
    pub fn new_fragment(sink: S, context: S::Handle, config: ParserConfig) -> Self {
        let builder = TreeBuilder::new_fragment(sink, config, context);
        let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
        if let Some((name, Namespace::Html)) = builder.fragment_context_name() {
            let state = match name {
                "title" | "textarea" => Some(TokenizerState::Rcdata),
                "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                    Some(TokenizerState::Rawtext)
                }
                "script" => Some(TokenizerState::ScriptData),
                "noscript" if config.scripting_enabled => Some(TokenizerState::Rawtext),
                "plaintext" => Some(TokenizerState::Plaintext),
                _ => None,
            };
            if let Some(state) = state {
                tokenizer.set_state(state);
            }
            let name = name.to_string();
            tokenizer.set_last_start_tag(&name);
        }
        Self {
            preprocessor: Preprocessor::new(),
            tokenizer,
            builder,
        }
    }

    /// Append a chunk and run the parse loop until it needs more input,
    /// reaches EOF, or stops.
    pub fn write(&mut self, chunk: &str, is_last: bool) -> Result<(), EngineInvariantError> {
        self.preprocessor.write(chunk, is_last);
        self.pump()
    }

    fn pump(&mut self) -> Result<(), EngineInvariantError> {
        while !self.builder.stopped() {
            let token = self.tokenizer.get_next_token(&mut self.preprocessor);
            match token {
                Token::Hibernation => break,
                Token::Eof => {
                    self.builder.set_position(self.preprocessor.position());
                    self.builder.process_token(Token::Eof, &mut self.tokenizer)?;
                    break;
                }
                token => {
                    self.builder.set_position(self.preprocessor.position());
                    self.builder.process_token(token, &mut self.tokenizer)?;
                }
            }
        }
        Ok(())
    }

    pub fn document(&self) -> S::Handle {
        self.builder.document()
    }

    /// Collect a finished fragment parse's nodes into a document fragment.
    pub fn finish_fragment(&mut self) -> Result<S::Handle, EngineInvariantError> {
        self.builder.finish_fragment()
    }

    pub fn sink(&self) -> &S {
        self.builder.sink()
    }

    pub fn into_sink(self) -> S {
        self.builder.into_sink()
    }

    /// Advisory parse errors recorded so far, in input order.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        let mut errors = self.tokenizer.take_errors();
        errors.append(&mut self.builder.take_errors());
        errors.sort_by_key(|error| error.position);
        errors
    }
}

/// Parse a complete document; returns the sink and the document handle.
pub fn parse_document<S: TreeSink>(
    sink: S,
    html: &str,
    config: ParserConfig,
) -> Result<(S, S::Handle), EngineInvariantError> {
    let mut parser = Parser::new(sink, config);
    parser.write(html, true)?;
    let document = parser.document();
    Ok((parser.into_sink(), document))
}

/// Parse a fragment against `context`; returns the sink and the fragment
/// handle holding the parsed children.
pub fn parse_fragment<S: TreeSink>(
    sink: S,
    context: S::Handle,
    html: &str,
    config: ParserConfig,
) -> Result<(S, S::Handle), EngineInvariantError> {
    let mut parser = Parser::new_fragment(sink, context, config);
    parser.write(html, true)?;
    let fragment = parser.finish_fragment()?;
    Ok((parser.into_sink(), fragment))
}
