//! Benchmarks for preset compilation and binding lookup
//!
//! Run with: cargo bench keymap

use keyloom::keymap::types::{parse_chord, parse_sequence};
use keyloom::keymap::{compile, CompiledBindingTable, Event, KeymapEngine};
use keyloom::preset::{normalize, Preset, PresetDoc};

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

fn main() {
    divan::main();
}

/// Synthesize a preset with `n` bindings spread over chords and sequences.
fn synthetic_preset(n: usize) -> Preset {
    let letters = "abcdefghijklmnopqrstuvwxyz";
    let mut bindings = String::new();
    for i in 0..n {
        let a = letters.as_bytes()[i % 26] as char;
        let b = letters.as_bytes()[(i / 26) % 26] as char;
        bindings.push_str(&format!(
            r#"{{"key": "ctrl+{} {}", "command": "cmd.{}"}},"#,
            a, b, i
        ));
    }
    bindings.pop();

    let doc: PresetDoc = serde_json::from_str(&format!(
        r#"{{
            "modes": [{{"name": "normal"}}, {{"name": "visual"}}],
            "bindings": [{}]
        }}"#,
        bindings
    ))
    .unwrap();
    normalize(&doc, "bench", 0).unwrap()
}

fn compiled(n: usize) -> CompiledBindingTable {
    compile(&[synthetic_preset(n)]).unwrap()
}

#[divan::bench(args = [10, 100, 500])]
fn compile_preset(bencher: divan::Bencher, n: usize) {
    let preset = synthetic_preset(n);
    bencher.bench(|| {
        let table = compile(divan::black_box(std::slice::from_ref(&preset))).unwrap();
        divan::black_box(table);
    });
}

#[divan::bench(args = [10, 100, 500])]
fn lookup_exact(bencher: divan::Bencher, n: usize) {
    let table = compiled(n);
    let seq = parse_sequence("ctrl+a a").unwrap();
    bencher.bench(|| {
        divan::black_box(table.lookup(divan::black_box("normal"), divan::black_box(&seq)));
    });
}

#[divan::bench(args = [10, 100, 500])]
fn lookup_miss(bencher: divan::Bencher, n: usize) {
    let table = compiled(n);
    let seq = vec![parse_chord("f9").unwrap()];
    bencher.bench(|| {
        divan::black_box(table.lookup(divan::black_box("normal"), divan::black_box(&seq)));
    });
}

#[divan::bench]
fn engine_full_sequence(bencher: divan::Bencher) {
    let table = compiled(100);
    let first = parse_chord("ctrl+a").unwrap();
    let second = parse_chord("a").unwrap();
    bencher.bench(|| {
        let mut engine = KeymapEngine::new(table.clone());
        divan::black_box(engine.handle(Event::Key(first)));
        divan::black_box(engine.handle(Event::Key(second)));
    });
}
