//! Golden tree-construction corpus.
//!
//! Each case pairs an input document with the expected tree in the html5lib
//! snapshot format rendered by `arena-dom`. Cases are grouped by mechanism
//! (structure synthesis, lists, tables, formatting, foreign content, ...)
//! rather than exhaustively by tag.

use arena_dom::ArenaDom;
use html5::{parse_document, Parser, ParserConfig};

fn snapshot_of(html: &str) -> String {
    let (dom, document) =
        parse_document(ArenaDom::new(), html, ParserConfig::default()).expect("parse");
    dom.snapshot(document)
}

struct Case {
    input: &'static str,
    expected: &'static str,
}

fn run(cases: &[Case]) {
    for case in cases {
        let actual = snapshot_of(case.input);
        assert_eq!(
            actual, case.expected,
            "tree mismatch for input {:?}\nexpected:\n{}\nactual:\n{}",
            case.input, case.expected, actual
        );
    }
}

#[test]
fn explicit_structure_roundtrips() {
    run(&[Case {
        input: "<!DOCTYPE html><html lang=en><head></head><body>x</body></html>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   lang=\"en\"\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     \"x\"\n",
    }]);
}

#[test]
fn doctype_identifiers_are_preserved() {
    run(&[Case {
        input: "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"><p>",
        expected: "| <!DOCTYPE html \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <p>\n",
    }]);
}

#[test]
fn list_items_close_their_predecessors() {
    run(&[
        Case {
            input: "<!DOCTYPE html><ul><li>a<li>b</ul>",
            expected: "| <!DOCTYPE html>\n\
                       | <html>\n\
                       |   <head>\n\
                       |   <body>\n\
                       |     <ul>\n\
                       |       <li>\n\
                       |         \"a\"\n\
                       |       <li>\n\
                       |         \"b\"\n",
        },
        Case {
            input: "<!DOCTYPE html><dl><dt>t<dd>d</dl>",
            expected: "| <!DOCTYPE html>\n\
                       | <html>\n\
                       |   <head>\n\
                       |   <body>\n\
                       |     <dl>\n\
                       |       <dt>\n\
                       |         \"t\"\n\
                       |       <dd>\n\
                       |         \"d\"\n",
        },
    ]);
}

#[test]
fn headings_do_not_nest() {
    run(&[Case {
        input: "<!DOCTYPE html><h1>a<h2>b",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <h1>\n\
                   |       \"a\"\n\
                   |     <h2>\n\
                   |       \"b\"\n",
    }]);
}

#[test]
fn second_anchor_triggers_the_adoption_agency() {
    run(&[Case {
        input: "<!DOCTYPE html><a>1<div>2<a>3",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <a>\n\
                   |       \"1\"\n\
                   |     <div>\n\
                   |       <a>\n\
                   |         \"2\"\n\
                   |       <a>\n\
                   |         \"3\"\n",
    }]);
}

#[test]
fn marquee_is_a_formatting_scope_boundary() {
    run(&[Case {
        input: "<!DOCTYPE html><b><marquee>x</marquee>y",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <b>\n\
                   |       <marquee>\n\
                   |         \"x\"\n\
                   |       \"y\"\n",
    }]);
}

#[test]
fn table_sections_and_captions_assemble() {
    run(&[
        Case {
            input: "<!DOCTYPE html><table><caption>c</caption><tr><td>d</table>",
            expected: "| <!DOCTYPE html>\n\
                       | <html>\n\
                       |   <head>\n\
                       |   <body>\n\
                       |     <table>\n\
                       |       <caption>\n\
                       |         \"c\"\n\
                       |       <tbody>\n\
                       |         <tr>\n\
                       |           <td>\n\
                       |             \"d\"\n",
        },
        Case {
            input: "<!DOCTYPE html><table><col span=2></table>",
            expected: "| <!DOCTYPE html>\n\
                       | <html>\n\
                       |   <head>\n\
                       |   <body>\n\
                       |     <table>\n\
                       |       <colgroup>\n\
                       |         <col>\n\
                       |           span=\"2\"\n",
        },
    ]);
}

#[test]
fn select_inside_a_table_cell_closes_on_new_cells() {
    run(&[Case {
        input: "<!DOCTYPE html><table><tr><td><select><td>x</select></table>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <table>\n\
                   |       <tbody>\n\
                   |         <tr>\n\
                   |           <td>\n\
                   |             <select>\n\
                   |           <td>\n\
                   |             \"x\"\n",
    }]);
}

#[test]
fn plaintext_swallows_the_rest_of_the_document() {
    run(&[Case {
        input: "<!DOCTYPE html><plaintext>a</plaintext><b>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <plaintext>\n\
                   |       \"a</plaintext><b>\"\n",
    }]);
}

#[test]
fn xmp_is_raw_text() {
    run(&[Case {
        input: "<!DOCTYPE html><xmp><b>raw</b></xmp>after",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <xmp>\n\
                   |       \"<b>raw</b>\"\n\
                   |     \"after\"\n",
    }]);
}

#[test]
fn script_bodies_keep_partial_close_tags() {
    run(&[Case {
        input: "<!DOCTYPE html><script>var a = '</scr' + 'ipt>';</script>done",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |     <script>\n\
                   |       \"var a = '</scr' + 'ipt>';\"\n\
                   |   <body>\n\
                   |     \"done\"\n",
    }]);
}

#[test]
fn character_references_decode_in_text_and_attributes() {
    run(&[Case {
        input: "<!DOCTYPE html><p title=\"a&amp;b\">x &lt; y</p>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <p>\n\
                   |       title=\"a&b\"\n\
                   |       \"x < y\"\n",
    }]);
}

#[test]
fn duplicate_forms_are_ignored_via_the_form_pointer() {
    run(&[Case {
        input: "<!DOCTYPE html><form><form><input>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <form>\n\
                   |       <input>\n",
    }]);
}

#[test]
fn templates_inside_tables_capture_row_content() {
    run(&[Case {
        input: "<!DOCTYPE html><table><template><tr><td>x</td></tr></template></table>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <table>\n\
                   |       <template>\n\
                   |         content\n\
                   |           <tr>\n\
                   |             <td>\n\
                   |               \"x\"\n",
    }]);
}

#[test]
fn mathml_annotation_xml_html_encoding_is_an_integration_point() {
    run(&[Case {
        input: "<!DOCTYPE html><math><annotation-xml encoding=\"text/html\"><p>x</p></annotation-xml></math>",
        expected: "| <!DOCTYPE html>\n\
                   | <html>\n\
                   |   <head>\n\
                   |   <body>\n\
                   |     <math math>\n\
                   |       <math annotation-xml>\n\
                   |         encoding=\"text/html\"\n\
                   |         <p>\n\
                   |           \"x\"\n",
    }]);
}

#[test]
fn parse_errors_are_advisory_and_never_fatal() {
    let mut parser = Parser::new(ArenaDom::new(), ParserConfig::default());
    parser
        .write("</p><b><table>oops</b></table>&bogus;", true)
        .expect("recovery must always produce a tree");
    let errors = parser.take_errors();
    assert!(
        !errors.is_empty(),
        "misnested input should record advisory parse errors"
    );
    let positions: Vec<usize> = errors.iter().map(|error| error.position).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "errors must be reported in input order");
}

#[test]
fn repeated_parses_yield_structurally_identical_trees() {
    let input = "<!DOCTYPE html><div class=a>x<b>y<table>z<tr><td>w</table></b></div>";
    let first = snapshot_of(input);
    let second = snapshot_of(input);
    assert_eq!(first, second, "tree shape must be deterministic");
}
