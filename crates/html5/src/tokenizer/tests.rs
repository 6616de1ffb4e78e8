use super::{Tokenizer, TokenizerConfig, TokenizerState};
use crate::preprocessor::Preprocessor;
use crate::token::{CharacterKind, Token};

fn tokenize_all(input: &str) -> Vec<Token> {
    let mut pre = Preprocessor::new();
    pre.write(input, true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut out = Vec::new();
    loop {
        match tokenizer.get_next_token(&mut pre) {
            Token::Hibernation => panic!("single-chunk input must not hibernate"),
            Token::Eof => {
                out.push(Token::Eof);
                return out;
            }
            token => out.push(token),
        }
    }
}

fn tokenize_chunked(chunks: &[&str]) -> Vec<Token> {
    let mut pre = Preprocessor::new();
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut out = Vec::new();
    let mut iter = chunks.iter().peekable();
    let first = iter.next().expect("at least one chunk");
    pre.write(first, iter.peek().is_none());
    loop {
        match tokenizer.get_next_token(&mut pre) {
            Token::Hibernation => {
                let chunk = iter.next().expect("hibernation requires a further chunk");
                pre.write(chunk, iter.peek().is_none());
            }
            Token::Eof => {
                out.push(Token::Eof);
                return out;
            }
            token => out.push(token),
        }
    }
}

fn text_of(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(|token| match token {
            Token::Characters { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn tokenizes_simple_tags_and_text() {
    let tokens = tokenize_all("<p>hi</p>");
    assert!(
        matches!(
            tokens.as_slice(),
            [
                Token::StartTag(start),
                Token::Characters { text, .. },
                Token::EndTag(end),
                Token::Eof,
            ] if start.name == "p" && text == "hi" && end.name == "p"
        ),
        "unexpected token stream: {tokens:?}"
    );
}

#[test]
fn folds_tag_and_attribute_names_to_lowercase() {
    let tokens = tokenize_all("<DiV CLASS=Main ID='x'>");
    let Token::StartTag(tag) = &tokens[0] else {
        panic!("expected start tag, got: {tokens:?}");
    };
    assert_eq!(tag.name, "div");
    assert_eq!(tag.attr("class"), Some("Main"));
    assert_eq!(tag.attr("id"), Some("x"));
}

#[test]
fn duplicate_attributes_keep_the_first_occurrence() {
    let tokens = tokenize_all("<a href='one' href='two' HREF=three>");
    let Token::StartTag(tag) = &tokens[0] else {
        panic!("expected start tag, got: {tokens:?}");
    };
    assert_eq!(tag.attrs.len(), 1, "later duplicates must be dropped");
    assert_eq!(tag.attr("href"), Some("one"));
}

#[test]
fn self_closing_flag_is_reported() {
    let tokens = tokenize_all("<br/><input type=text />");
    assert!(
        matches!(
            (&tokens[0], &tokens[1]),
            (Token::StartTag(br), Token::StartTag(input))
                if br.name == "br" && br.self_closing
                    && input.name == "input" && input.self_closing
        ),
        "unexpected token stream: {tokens:?}"
    );
}

#[test]
fn character_runs_split_by_kind() {
    let tokens = tokenize_all("a b");
    assert!(
        matches!(
            tokens.as_slice(),
            [
                Token::Characters { kind: CharacterKind::Ordinary, text: a },
                Token::Characters { kind: CharacterKind::Whitespace, text: ws },
                Token::Characters { kind: CharacterKind::Ordinary, text: b },
                Token::Eof,
            ] if a == "a" && ws == " " && b == "b"
        ),
        "expected runs split at kind changes, got: {tokens:?}"
    );
}

#[test]
fn null_characters_form_their_own_run_in_data() {
    let tokens = tokenize_all("a\0b");
    assert!(
        matches!(
            &tokens[1],
            Token::Characters { kind: CharacterKind::Null, text } if text == "\0"
        ),
        "expected NUL-only run, got: {tokens:?}"
    );
}

#[test]
fn crlf_sequences_normalize_to_single_newlines() {
    let tokens = tokenize_all("a\r\nb\rc");
    assert_eq!(text_of(&tokens), "a\nb\nc");
}

#[test]
fn comments_roundtrip_their_payload() {
    let tokens = tokenize_all("<!--x-y--><!---->");
    assert!(
        matches!(
            (&tokens[0], &tokens[1]),
            (Token::Comment(a), Token::Comment(b)) if a == "x-y" && b.is_empty()
        ),
        "unexpected comments: {tokens:?}"
    );
}

#[test]
fn bogus_comment_recovers_processing_instructions() {
    let tokens = tokenize_all("<?php echo ?>");
    assert!(
        matches!(&tokens[0], Token::Comment(text) if text == "?php echo ?"),
        "expected bogus comment, got: {tokens:?}"
    );
}

#[test]
fn doctype_with_identifiers_parses_all_fields() {
    let tokens = tokenize_all(r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01//EN" 'legacy'>"#);
    let Token::Doctype(doctype) = &tokens[0] else {
        panic!("expected doctype, got: {tokens:?}");
    };
    assert_eq!(doctype.name.as_deref(), Some("html"));
    assert_eq!(doctype.public_id.as_deref(), Some("-//W3C//DTD HTML 4.01//EN"));
    assert_eq!(doctype.system_id.as_deref(), Some("legacy"));
    assert!(!doctype.force_quirks);
}

#[test]
fn truncated_doctype_forces_quirks() {
    let tokens = tokenize_all("<!DOCTYPE html PUBLIC>");
    let Token::Doctype(doctype) = &tokens[0] else {
        panic!("expected doctype, got: {tokens:?}");
    };
    assert!(doctype.force_quirks);
}

#[test]
fn ampersand_references_all_decode_to_ampersand() {
    for input in ["&amp;", "&amp", "&AMP;", "&#38;", "&#x26;", "&#X26;"] {
        let tokens = tokenize_all(input);
        assert_eq!(text_of(&tokens), "&", "input {input:?} gave: {tokens:?}");
    }
}

#[test]
fn longest_match_wins_without_semicolon() {
    // `not` is the longest terminated match; the rest replays as text.
    let tokens = tokenize_all("I'm &notit I tell you");
    assert_eq!(text_of(&tokens), "I'm \u{AC}it I tell you");
    let tokens = tokenize_all("&notin;");
    assert_eq!(text_of(&tokens), "\u{2209}");
}

#[test]
fn attribute_values_keep_legacy_references_before_equals_literal() {
    let tokens = tokenize_all("<a href=\"?foo&notit=1\">");
    let Token::StartTag(tag) = &tokens[0] else {
        panic!("expected start tag, got: {tokens:?}");
    };
    assert_eq!(tag.attr("href"), Some("?foo&notit=1"));

    // Outside the blocking rule the legacy form still decodes.
    let tokens = tokenize_all("<a href=\"x&not-y\">");
    let Token::StartTag(tag) = &tokens[0] else {
        panic!("expected start tag, got: {tokens:?}");
    };
    assert_eq!(tag.attr("href"), Some("x\u{AC}-y"));
}

#[test]
fn unknown_references_replay_literally() {
    let tokens = tokenize_all("&zzqq; &#; &# &x;");
    assert_eq!(text_of(&tokens), "&zzqq; &#; &# &x;");
}

#[test]
fn numeric_reference_edge_values_are_replaced() {
    let tokens = tokenize_all("&#0;&#xD800;&#x110000;&#x80;");
    assert_eq!(text_of(&tokens), "\u{FFFD}\u{FFFD}\u{FFFD}\u{20AC}");
}

#[test]
fn rawtext_mode_only_ends_on_appropriate_end_tag() {
    let mut pre = Preprocessor::new();
    pre.write("<style>a { content: '</div>' }</style>x", true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut out = Vec::new();
    loop {
        let token = tokenizer.get_next_token(&mut pre);
        if let Token::StartTag(tag) = &token {
            if tag.name == "style" {
                tokenizer.set_state(TokenizerState::Rawtext);
            }
        }
        let done = matches!(token, Token::Eof);
        out.push(token);
        if done {
            break;
        }
    }
    assert!(
        matches!(
            out.as_slice(),
            [
                Token::StartTag(_),
                Token::Characters { text: body, .. },
                Token::EndTag(end),
                Token::Characters { text: tail, .. },
                Token::Eof,
            ] if body == "a { content: '</div>' }" && end.name == "style" && tail == "x"
        ),
        "unexpected rawtext stream: {out:?}"
    );
}

#[test]
fn script_data_keeps_partial_close_tags_as_text() {
    let mut pre = Preprocessor::new();
    pre.write("<script>if (a</scr) b</script>", true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut out = Vec::new();
    loop {
        let token = tokenizer.get_next_token(&mut pre);
        if let Token::StartTag(tag) = &token {
            if tag.name == "script" {
                tokenizer.set_state(TokenizerState::ScriptData);
            }
        }
        let done = matches!(token, Token::Eof);
        out.push(token);
        if done {
            break;
        }
    }
    assert_eq!(text_of(&out), "if (a</scr) b");
    assert!(
        out.iter()
            .any(|token| matches!(token, Token::EndTag(tag) if tag.name == "script")),
        "expected the real close tag to terminate script data: {out:?}"
    );
}

#[test]
fn script_escape_states_hide_close_tags_inside_comments() {
    let mut pre = Preprocessor::new();
    pre.write("<script><!--<script>x</script>--></script>", true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut end_tags = 0;
    let mut text = String::new();
    loop {
        let token = tokenizer.get_next_token(&mut pre);
        match &token {
            Token::StartTag(tag) if tag.name == "script" => {
                tokenizer.set_state(TokenizerState::ScriptData);
            }
            Token::Characters { text: t, .. } => text.push_str(t),
            Token::EndTag(tag) if tag.name == "script" => end_tags += 1,
            Token::Eof => break,
            _ => {}
        }
    }
    assert_eq!(
        text, "<!--<script>x</script>-->",
        "double-escaped close tag must stay literal"
    );
    assert_eq!(end_tags, 1, "only the outer close tag terminates the script");
}

#[test]
fn rcdata_decodes_references_but_not_tags() {
    let mut pre = Preprocessor::new();
    pre.write("<title>a &amp; <b></title>", true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut out = Vec::new();
    loop {
        let token = tokenizer.get_next_token(&mut pre);
        if let Token::StartTag(tag) = &token {
            if tag.name == "title" {
                tokenizer.set_state(TokenizerState::Rcdata);
            }
        }
        let done = matches!(token, Token::Eof);
        out.push(token);
        if done {
            break;
        }
    }
    assert_eq!(text_of(&out), "a & <b>");
}

#[test]
fn hibernation_resumes_mid_tag_without_losing_state() {
    let tokens = tokenize_chunked(&["<di", "v cl", "ass='a", "'>ok"]);
    assert!(
        matches!(
            tokens.as_slice(),
            [Token::StartTag(tag), Token::Characters { text, .. }, Token::Eof]
                if tag.name == "div" && tag.attr("class") == Some("a") && text == "ok"
        ),
        "unexpected chunked stream: {tokens:?}"
    );
}

#[test]
fn chunking_never_changes_the_token_stream() {
    let input = "<!DOCTYPE html><p class=\"a&ampb\">x &notit; y<\u{0441}><!--c--><table>&#xA9;</table>";
    let whole = tokenize_all(input);
    for split in 1..input.len() {
        if !input.is_char_boundary(split) {
            continue;
        }
        let (a, b) = input.split_at(split);
        let chunked = tokenize_chunked(&[a, b]);
        assert_eq!(
            whole, chunked,
            "token stream diverged for split at byte {split}"
        );
    }
}

#[test]
fn lookahead_sequences_hibernate_cleanly_across_chunks() {
    // Chunk boundaries inside `<!DOCTYPE` and `<!--` exercise the sequence
    // matcher's need-more-input path.
    let tokens = tokenize_chunked(&["<!DOC", "TYPE html><!-", "-x-->"]);
    assert!(
        matches!(
            (&tokens[0], &tokens[1]),
            (Token::Doctype(doctype), Token::Comment(comment))
                if doctype.name.as_deref() == Some("html") && comment == "x"
        ),
        "unexpected stream: {tokens:?}"
    );
}

#[test]
fn named_reference_walk_hibernates_and_resumes() {
    let tokens = tokenize_chunked(&["x&no", "tin; y"]);
    assert_eq!(text_of(&tokens), "x\u{2209} y");
}

#[test]
fn cdata_sections_require_foreign_context() {
    let tokens = tokenize_all("<![CDATA[x]]>");
    assert!(
        matches!(&tokens[0], Token::Comment(text) if text == "[CDATA[x]]"),
        "CDATA outside foreign content must become a bogus comment: {tokens:?}"
    );

    let mut pre = Preprocessor::new();
    pre.write("<![CDATA[a]]b]]>", true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    tokenizer.set_allow_cdata(true);
    let mut out = Vec::new();
    loop {
        match tokenizer.get_next_token(&mut pre) {
            Token::Eof => break,
            token => out.push(token),
        }
    }
    assert_eq!(text_of(&out), "a]]b");
}

#[test]
fn plaintext_consumes_everything() {
    let mut pre = Preprocessor::new();
    pre.write("a</plaintext><b>", true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    tokenizer.set_state(TokenizerState::Plaintext);
    let mut out = Vec::new();
    loop {
        match tokenizer.get_next_token(&mut pre) {
            Token::Eof => break,
            token => out.push(token),
        }
    }
    assert_eq!(text_of(&out), "a</plaintext><b>");
}

#[test]
fn end_tags_with_attributes_keep_name_only_semantics() {
    let tokens = tokenize_all("</div class='x'>");
    assert!(
        matches!(&tokens[0], Token::EndTag(tag) if tag.name == "div"),
        "unexpected stream: {tokens:?}"
    );
}

#[test]
fn eof_inside_tag_discards_the_partial_token() {
    let tokens = tokenize_all("text<div cla");
    assert_eq!(text_of(&tokens), "text");
    assert!(
        !tokens.iter().any(|token| matches!(token, Token::StartTag(_))),
        "partial tag at EOF must not be emitted: {tokens:?}"
    );
}
