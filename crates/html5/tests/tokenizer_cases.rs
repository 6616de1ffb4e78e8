//! JSON-driven tokenizer cases in the html5lib-tests token format
//! (`["StartTag", name, {attrs}]`, `["Character", data]`, ...). The fixture is
//! embedded; the runner shape matches the external suites so more cases can be
//! dropped in wholesale.

use html5::tokenizer::{Tokenizer, TokenizerConfig};
use html5::{Preprocessor, Token};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct TokenizerCase {
    description: String,
    input: String,
    output: Vec<Value>,
}

static CASES: &str = r#"[
  {
    "description": "basic tag with attributes",
    "input": "<div id=a CLASS='b'>t</div>",
    "output": [
      ["StartTag", "div", {"id": "a", "class": "b"}],
      ["Character", "t"],
      ["EndTag", "div"]
    ]
  },
  {
    "description": "duplicate attributes keep the first value",
    "input": "<a b=1 b=2>",
    "output": [["StartTag", "a", {"b": "1"}]]
  },
  {
    "description": "character references",
    "input": "&amp;&#65;&notin;&unknown;",
    "output": [["Character", "&A∉&unknown;"]]
  },
  {
    "description": "legacy reference without semicolon",
    "input": "&copy today",
    "output": [["Character", "© today"]]
  },
  {
    "description": "comment variants",
    "input": "<!--x--><!---->",
    "output": [["Comment", "x"], ["Comment", ""]]
  },
  {
    "description": "doctype with public id",
    "input": "<!DOCTYPE html PUBLIC \"pid\">",
    "output": [["DOCTYPE", "html", "pid", null, true]]
  },
  {
    "description": "whitespace and text runs coalesce for comparison",
    "input": "a b\tc",
    "output": [["Character", "a b\tc"]]
  },
  {
    "description": "self-closing void element",
    "input": "<br/>",
    "output": [["StartTag", "br", {}, true]]
  }
]"#;

fn tokenize(input: &str) -> Vec<Token> {
    let mut pre = Preprocessor::new();
    pre.write(input, true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut out = Vec::new();
    loop {
        match tokenizer.get_next_token(&mut pre) {
            Token::Eof => return out,
            Token::Hibernation => panic!("single-chunk input must not hibernate"),
            token => out.push(token),
        }
    }
}

/// Render our token stream in the html5lib comparison shape, coalescing
/// adjacent character tokens the way the suite does.
fn render(tokens: &[Token]) -> Vec<Value> {
    use serde_json::json;
    let mut out: Vec<Value> = Vec::new();
    for token in tokens {
        match token {
            Token::Characters { text, .. } => {
                if let Some(Value::Array(last)) = out.last_mut() {
                    if last.first() == Some(&json!("Character")) {
                        let merged = format!(
                            "{}{}",
                            last[1].as_str().unwrap_or_default(),
                            text
                        );
                        last[1] = json!(merged);
                        continue;
                    }
                }
                out.push(json!(["Character", text]));
            }
            Token::StartTag(tag) => {
                let attrs: serde_json::Map<String, Value> = tag
                    .attrs
                    .iter()
                    .map(|attr| (attr.name.clone(), json!(attr.value)))
                    .collect();
                if tag.self_closing {
                    out.push(json!(["StartTag", tag.name, attrs, true]));
                } else {
                    out.push(json!(["StartTag", tag.name, attrs]));
                }
            }
            Token::EndTag(tag) => out.push(json!(["EndTag", tag.name])),
            Token::Comment(text) => out.push(json!(["Comment", text])),
            Token::Doctype(doctype) => out.push(json!([
                "DOCTYPE",
                doctype.name,
                doctype.public_id,
                doctype.system_id,
                !doctype.force_quirks
            ])),
            Token::Eof | Token::Hibernation => {}
        }
    }
    out
}

#[test]
fn embedded_tokenizer_cases_pass() {
    let cases: Vec<TokenizerCase> = serde_json::from_str(CASES).expect("fixture parses");
    assert!(!cases.is_empty(), "no tokenizer cases found");
    for case in cases {
        let tokens = tokenize(&case.input);
        let actual = render(&tokens);
        let expected = case.output;
        assert_eq!(
            actual, expected,
            "token mismatch for case {:?} (input {:?})",
            case.description, case.input
        );
    }
}
