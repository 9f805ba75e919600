//! Lexer benchmarks.
//!
//! Run with: `cargo bench --package scrapec-lex`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use scrapec_lex::Lexer;

fn lexer_token_count(source: &str) -> usize {
    Lexer::new(source).tokenize().map(|t| t.len()).unwrap_or(0)
}

fn bench_lexer_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    let source = "extract 'title' 'h1.main', '.headline'\nsave_row";
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("simple_extract", |b| {
        b.iter(|| lexer_token_count(black_box("extract 'title' 'h1'")))
    });

    group.bench_function("extract_with_fallback", |b| {
        b.iter(|| lexer_token_count(black_box(source)))
    });

    group.finish();
}

fn bench_lexer_script(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_script");

    let source = r#"
# Scrape a product listing
goto_url 'https://example.com/products'

foreach '.product-card' as @card
    extract 'name' '@card .title', '@card h3'
    extract_attribute 'link' 'href' '@card a'
    if exists '@card .price'
        extract 'price' '@card .price'
    else
        set_field 'price' 'n/a'
    end_if
    timestamp 'scraped_at'
    save_row
end_foreach
"#;
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("product_listing", |b| {
        b.iter(|| lexer_token_count(black_box(source)))
    });

    group.finish();
}

criterion_group!(benches, bench_lexer_statements, bench_lexer_script);
criterion_main!(benches);
