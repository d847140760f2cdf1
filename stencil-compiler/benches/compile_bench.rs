use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};
use stencil_compiler::Compiler;

const TODO: &str = r#"
<div class="todo {{filter}}">
    <h1>Todos</h1>
    <input value="{{draft}}" model="draft" lazy="100" placeholder="What needs doing?">
    <ul>
        {{#each items:i}}
            <li class="{{done ? 'done' : ''}}" on-click="toggle(i)">
                <span>{{i}}. {{title}}</span>
                {{#if tags.length}}<em>{{tags.length}} tags</em>{{/if}}
            </li>
        {{else}}
            <li>Nothing to do</li>
        {{/each}}
    </ul>
    <p>{{remaining}} left</p>
</div>
"#;

fn data(count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| json!({ "title": format!("task {i}"), "done": i % 3 == 0, "tags": ["a", "b"] }))
        .collect();
    json!({ "filter": "all", "draft": "", "items": items, "remaining": count })
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_uncached", |b| {
        let compiler = Compiler::default();
        b.iter(|| {
            compiler.clear_cache();
            compiler.compile(black_box(TODO)).unwrap()
        });
    });
    c.bench_function("compile_cached", |b| {
        let compiler = Compiler::default();
        b.iter(|| compiler.compile(black_box(TODO)).unwrap());
    });
}

fn bench_render(c: &mut Criterion) {
    let compiler = Compiler::default();
    let nodes = compiler.compile(TODO).unwrap();
    let program = compiler.generate(&nodes);

    let mut group = c.benchmark_group("render_todo");
    for &count in &[10usize, 100, 1000] {
        let mut host = data(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| program.render(&mut host).unwrap());
        });
    }
    group.finish();
}

fn bench_source(c: &mut Criterion) {
    let compiler = Compiler::default();
    let nodes = compiler.compile(TODO).unwrap();
    c.bench_function("generate_source", |b| {
        b.iter(|| compiler.generate_source(black_box(&nodes)).unwrap());
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().without_plots();
    targets = bench_compile, bench_render, bench_source
}
criterion_main!(benches);
