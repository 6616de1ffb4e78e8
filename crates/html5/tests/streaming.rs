//! Chunked-input parity: feeding a document in pieces must produce the same
//! tree as one-shot parsing, for every split point. This exercises tokenizer
//! hibernation (including mid-tag, mid-reference, and mid-lookahead
//! boundaries) and preprocessor resume.

use arena_dom::ArenaDom;
use html5::{parse_document, Parser, ParserConfig};

fn whole_snapshot(html: &str) -> String {
    let (dom, document) =
        parse_document(ArenaDom::new(), html, ParserConfig::default()).expect("parse");
    dom.snapshot(document)
}

fn chunked_snapshot(chunks: &[&str]) -> String {
    let mut parser = Parser::new(ArenaDom::new(), ParserConfig::default());
    let last = chunks.len() - 1;
    for (index, chunk) in chunks.iter().enumerate() {
        parser.write(chunk, index == last).expect("write");
    }
    let document = parser.document();
    parser.into_sink().snapshot(document)
}

#[test]
fn every_two_way_split_matches_the_whole_parse() {
    let inputs = [
        "<!DOCTYPE html><p class=\"a&ampb\">x &notit; y</p>",
        "<table>foo<tr><td>bar</td></tr></table>",
        "<b>1<i>2<p>3</b>4",
        "<script>if (a</scr) b</script>",
        "<!--c1--><title>t&amp;t</title><pre>\nx</pre>",
        "a\r\nb\rc<svg><![CDATA[d]]></svg>",
    ];
    for input in inputs {
        let whole = whole_snapshot(input);
        for split in 1..input.len() {
            if !input.is_char_boundary(split) {
                continue;
            }
            let (a, b) = input.split_at(split);
            assert_eq!(
                whole,
                chunked_snapshot(&[a, b]),
                "tree diverged for {input:?} split at byte {split}"
            );
        }
    }
}

#[test]
fn three_way_splits_match_on_a_reference_heavy_document() {
    let input = "<!DOCTYPE html><div title='&copy;'>&amp;&#x41;&notin;</div>";
    let whole = whole_snapshot(input);
    for first in 1..input.len() - 1 {
        if !input.is_char_boundary(first) {
            continue;
        }
        for second in (first + 1)..input.len() {
            if !input.is_char_boundary(second) {
                continue;
            }
            let chunks = [&input[..first], &input[first..second], &input[second..]];
            assert_eq!(
                whole,
                chunked_snapshot(&chunks),
                "tree diverged for splits at {first}/{second}"
            );
        }
    }
}

#[test]
fn one_byte_chunks_still_parse() {
    let input = "<!DOCTYPE html><ul><li>a<li>b</ul><!--done-->";
    let mut parser = Parser::new(ArenaDom::new(), ParserConfig::default());
    let bytes: Vec<&str> = input
        .char_indices()
        .map(|(start, ch)| &input[start..start + ch.len_utf8()])
        .collect();
    let last = bytes.len() - 1;
    for (index, chunk) in bytes.iter().enumerate() {
        parser.write(chunk, index == last).expect("write");
    }
    let document = parser.document();
    assert_eq!(parser.into_sink().snapshot(document), whole_snapshot(input));
}

#[test]
fn empty_final_chunk_finishes_the_parse() {
    let mut parser = Parser::new(ArenaDom::new(), ParserConfig::default());
    parser.write("<p>pending", false).expect("write");
    parser.write("", true).expect("final write");
    let document = parser.document();
    let snapshot = parser.into_sink().snapshot(document);
    assert!(
        snapshot.contains("<p>") && snapshot.contains("\"pending\""),
        "expected the buffered content to flush at EOF, got:\n{snapshot}"
    );
}
