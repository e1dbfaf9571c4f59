//! Compile and render throughput benchmarks
//!
//! Measures:
//! - Cold compilation of templates with a growing number of directives
//! - Cache hits for an already compiled template
//! - Rendering of a repeat-heavy page with a varying record count
//!
//! Run benchmarks: `cargo bench --bench compile_throughput`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::collections::HashMap;
use std::hint::black_box;
use talc::{CompileOptions, Compiler, TemplateCache, Value};

/// A page with `rows` conditional, rewritten rows.
fn generated_template(rows: usize) -> String {
    let mut source = String::from("<table>");
    for i in 0..rows {
        source.push_str(&format!(
            r#"<tr tal:condition="show" tal:attributes="id string:row-{i}"><td tal:content="string:cell {i}">x</td></tr>"#
        ));
    }
    source.push_str("</table>");
    source
}

const LISTING: &str = r#"<tal:block tal:condition="nothing"><li metal:define-macro="item" metal:define-param="any record"><b tal:content="record/name"/> <i tal:content="record/value"/></li></tal:block><ul><tal:block tal:repeat="record records"><li metal:use-macro="macros/item" metal:fill-param="record record"/></tal:block></ul>"#;

fn records(count: usize) -> HashMap<String, Value> {
    let records: Vec<_> = (0..count)
        .map(|i| json!({"name": format!("Record {}", i), "value": i}))
        .collect();
    HashMap::from([("records".to_string(), Value::from(json!(records)))])
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for rows in [10, 100, 1000] {
        let source = generated_template(rows);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &source, |b, source| {
            let compiler = Compiler::default();
            b.iter(|| compiler.compile(black_box(source), None).expect("compile"));
        });
    }
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = TemplateCache::builder().build().expect("cache");
    let source = generated_template(100);
    let options = CompileOptions::new().with_global("show", "bool");
    cache.compile(&source, &options).expect("warm up");
    c.bench_function("cache_hit", |b| {
        b.iter(|| cache.compile(black_box(&source), &options).expect("hit"));
    });
}

fn bench_render(c: &mut Criterion) {
    let cache = TemplateCache::builder().build().expect("cache");
    let options = CompileOptions::new().with_global("records", "list");
    let template = cache.compile(LISTING, &options).expect("compile");

    let mut group = c.benchmark_group("render");
    for count in [1, 10, 100, 1000] {
        let globals = records(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &globals, |b, globals| {
            b.iter(|| template.render(black_box(globals)).expect("render"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_cache_hit, bench_render);
criterion_main!(benches);
