use arena_dom::ArenaDom;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use html5::tokenizer::{Tokenizer, TokenizerConfig};
use html5::{parse_document, ParserConfig, Preprocessor, Token};

fn build_document(rows: usize) -> String {
    let mut out = String::from("<!DOCTYPE html><html><head><title>bench</title></head><body>");
    for row in 0..rows {
        out.push_str("<div class=row id=r");
        out.push_str(&row.to_string());
        out.push_str("><b>bold &amp; <i>nested</i></b><table><tr><td>cell</td></tr></table></div>\n");
    }
    out.push_str("</body></html>");
    out
}

fn tokenize_only(input: &str) -> usize {
    let mut pre = Preprocessor::new();
    pre.write(input, true);
    let mut tokenizer = Tokenizer::new(TokenizerConfig::default());
    let mut count = 0usize;
    loop {
        match tokenizer.get_next_token(&mut pre) {
            Token::Eof => return count,
            _ => count += 1,
        }
    }
}

fn bench_parse(c: &mut Criterion) {
    let input = build_document(200);
    let mut group = c.benchmark_group("html5");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("tokenize", |b| {
        b.iter(|| tokenize_only(black_box(&input)));
    });
    group.bench_function("parse_document", |b| {
        b.iter(|| {
            parse_document(ArenaDom::new(), black_box(&input), ParserConfig::default())
                .expect("parse")
        });
    });
    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
