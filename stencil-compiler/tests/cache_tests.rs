use std::sync::Arc;
use std::thread;

use stencil_compiler::{CacheStats, CompileOptions, Compiler};

#[test]
fn repeated_compiles_share_the_tree() {
    let compiler = Compiler::default();
    let first = compiler.compile("<p>{{a}}</p>").unwrap();
    let second = compiler.compile("<p>{{a}}</p>").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        compiler.cache_stats(),
        CacheStats {
            entries: 1,
            hits: 1,
            misses: 1,
        }
    );
}

#[test]
fn failures_are_not_cached() {
    let compiler = Compiler::default();
    assert!(compiler.compile("<p>").is_err());
    assert!(compiler.compile("<p>").is_err());
    let stats = compiler.cache_stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.misses, 2);
}

#[test]
fn full_cache_starts_over() {
    let compiler = Compiler::new(CompileOptions::new().with_cache_capacity(2));
    compiler.compile("a").unwrap();
    compiler.compile("b").unwrap();
    assert_eq!(compiler.cache_stats().entries, 2);

    compiler.compile("c").unwrap();
    assert_eq!(compiler.cache_stats().entries, 1);

    // "a" was evicted along with "b".
    compiler.compile("a").unwrap();
    assert_eq!(compiler.cache_stats().hits, 0);

    compiler.clear_cache();
    assert_eq!(compiler.cache_stats().entries, 0);
}

#[test]
fn compiler_is_shared_across_threads() {
    let compiler = Compiler::default();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let compiler = compiler.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    compiler.compile("<ul>{{#each list}}<li>{{this}}</li>{{/each}}</ul>").unwrap();
                }
                compiler.compile(&format!("<p>{i}</p>")).unwrap().len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(compiler.cache_stats().entries, 5);
}

#[test]
fn free_functions_use_the_default_compiler() {
    let nodes = stencil_compiler::compile("<b>shared</b>").unwrap();
    let again = stencil_compiler::default_compiler().compile("<b>shared</b>").unwrap();
    assert!(Arc::ptr_eq(&nodes, &again));

    let program = stencil_compiler::generate(&nodes);
    assert!(program.is_static());
    assert!(stencil_compiler::generate_source(&nodes).is_ok());
}
