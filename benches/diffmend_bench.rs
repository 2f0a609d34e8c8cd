use criterion::{black_box, criterion_group, criterion_main, Criterion};
use diffmend::{merge_overlapping_hunks, parse_patch, parse_patches, FilePatch, Pipeline, PipelineOptions};
use indoc::indoc;

// --- Parsing Benchmarks ---

fn parsing_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("Parsing");

    let simple_diff = indoc! {r#"
        A markdown answer with some text.
        ```diff
        --- a/src/main.rs
        +++ b/src/main.rs
        @@ -1,3 +1,3 @@
         fn main() {
        -    println!("Hello, world!");
        +    println!("Hello, diffmend!");
         }
        ```
    "#};
    group.bench_function("simple_diff", |b| {
        b.iter(|| parse_patch(black_box(simple_diff)).unwrap())
    });

    let mut large_diff = "--- a/large_file.txt\n+++ b/large_file.txt\n".to_string();
    for i in 0..100 {
        large_diff.push_str(&format!(
            "@@ -{},3 +{},3 @@\n context line {}\n-old line {}\n+new line {}\n",
            i * 5 + 1,
            i * 5 + 1,
            i,
            i,
            i
        ));
    }
    group.bench_function("large_diff_100_hunks", |b| {
        b.iter(|| parse_patches(black_box(&large_diff)).unwrap())
    });

    group.finish();
}

// --- Pipeline Benchmarks ---

struct PipelineBenchSetup {
    patch: FilePatch,
    initial_content: String,
}

fn pipeline_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    let pipeline = Pipeline::new(PipelineOptions::default());

    let mut large_file_content = String::new();
    for i in 0..10000 {
        large_file_content.push_str(&format!("This is line number {}\n", i));
    }
    let exact = PipelineBenchSetup {
        patch: parse_patch(indoc! {"
            @@ -5000,5 +5000,5 @@
             This is line number 4999
             This is line number 5000
            -This is line number 5001
            +THIS LINE WAS CHANGED
             This is line number 5002
             This is line number 5003
        "})
        .unwrap(),
        initial_content: large_file_content,
    };
    group.bench_function("exact_match_large_file", |b| {
        b.iter(|| {
            black_box(pipeline.run_patch(
                black_box(&exact.patch),
                black_box(Some(&exact.initial_content)),
            ))
        });
    });

    // Forty lines of drift: the fuzzy window misses, the distinctive line finds it.
    let mut drifted = String::new();
    for i in 0..40 {
        drifted.push_str(&format!("inserted filler {}\n", i));
    }
    drifted.push_str(&exact.initial_content);
    let drift = PipelineBenchSetup {
        patch: exact.patch.clone(),
        initial_content: drifted,
    };
    group.bench_function("distinctive_line_after_drift", |b| {
        b.iter(|| {
            black_box(pipeline.run_patch(
                black_box(&drift.patch),
                black_box(Some(&drift.initial_content)),
            ))
        });
    });

    // Nothing matches anywhere: every resolver runs to completion.
    let worst = PipelineBenchSetup {
        patch: parse_patch(indoc! {"
            @@ -5000,3 +5000,3 @@
             This is a unique context line 1
            -This is a unique line to be removed
            +This is a unique line to be added
             This is a unique context line 2
        "})
        .unwrap(),
        initial_content: "println!(\"hello world\");\n".repeat(10000),
    };
    group.bench_function("unresolvable_worst_case", |b| {
        b.iter(|| {
            black_box(pipeline.run_patch(
                black_box(&worst.patch),
                black_box(Some(&worst.initial_content)),
            ))
        });
    });

    group.finish();
}

fn overlap_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("Overlap");

    let lines: Vec<String> = (0..2000).map(|i| format!("line {}", i)).collect();
    let mut diff = String::new();
    // Chains of hunks that each overlap the next by two lines.
    for i in 0..50 {
        let start = i * 3 + 1;
        diff.push_str(&format!(
            "@@ -{},4 +{},4 @@\n line {}\n line {}\n-line {}\n+changed {}\n line {}\n",
            start,
            start,
            start - 1,
            start,
            start + 1,
            start + 1,
            start + 2
        ));
    }
    let patch = parse_patch(&diff).unwrap();
    group.bench_function("merge_chain_50_hunks", |b| {
        b.iter(|| merge_overlapping_hunks(black_box(&patch.hunks), black_box(&lines)))
    });

    group.finish();
}

criterion_group!(benches, parsing_benches, pipeline_benches, overlap_benches);
criterion_main!(benches);
