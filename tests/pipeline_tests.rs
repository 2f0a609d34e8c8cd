use diffmend::{
    run_pipeline, FatalError, FilePatch, HunkErrorKind, HunkStatus, ParseError, Pipeline,
    PipelineOptions, PipelineStatus,
};
use indoc::indoc;

const IO_PY: &str = indoc! {r#"
    import os

    def load(path):
        with open(path) as f:
            return f.read()

    def save(path, data):
        with open(path, "w") as f:
            f.write(data)
"#};

const IO_PY_JSON: &str = indoc! {r#"
    import os
    import json

    def load(path):
        with open(path) as f:
            return json.load(f)

    def save(path, data):
        with open(path, "w") as f:
            json.dump(data, f)
"#};

const IO_PY_DIFF: &str = indoc! {r#"
    --- a/io.py
    +++ b/io.py
    @@ -1,5 +1,6 @@
     import os
    +import json

     def load(path):
         with open(path) as f:
    -        return f.read()
    +        return json.load(f)
    @@ -7,3 +8,3 @@
     def save(path, data):
         with open(path, "w") as f:
    -        f.write(data)
    +        json.dump(data, f)
"#};

fn strategy(status: &HunkStatus) -> Option<&'static str> {
    match status {
        HunkStatus::Succeeded { strategy, .. } => Some(strategy),
        _ => None,
    }
}

#[test]
fn test_multi_hunk_diff_applies_exactly() {
    let _ = env_logger::builder().is_test(true).try_init();
    let outcome = run_pipeline(IO_PY_DIFF, Some(IO_PY), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(outcome.new_content, IO_PY_JSON);
    assert_eq!(outcome.result.succeeded(), vec![1, 2]);
    assert_eq!(strategy(&outcome.result.hunks[&1]), Some("exact"));
    assert_eq!(strategy(&outcome.result.hunks[&2]), Some("exact"));
    assert!(outcome.result.model_feedback.is_none());
    assert!(outcome.result.error.is_none());
}

#[test]
fn test_second_run_is_a_no_op() {
    let options = PipelineOptions::default();
    let first = run_pipeline(IO_PY_DIFF, Some(IO_PY), &options);
    let second = run_pipeline(IO_PY_DIFF, Some(&first.new_content), &options);

    assert_eq!(second.result.status, PipelineStatus::Success);
    assert_eq!(second.result.already_applied(), vec![1, 2]);
    assert_eq!(second.new_content, first.new_content);
}

#[test]
fn test_generated_patch_reproduces_the_new_text() {
    let patch = FilePatch::from_texts("io.py", IO_PY, IO_PY_JSON, 3).unwrap();
    let outcome = Pipeline::new(PipelineOptions::default()).run_patch(&patch, Some(IO_PY));
    assert!(outcome.result.is_success());
    assert_eq!(outcome.new_content, IO_PY_JSON);
}

#[test]
fn test_drifted_header_is_placed_by_fuzzy_search() {
    let outcome = run_pipeline("@@ -5,1 +5,1 @@\n-b\n+B\n", Some("a\nb\nc\n"), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(outcome.new_content, "a\nB\nc\n");
    assert_eq!(strategy(&outcome.result.hunks[&1]), Some("fuzzy"));
}

#[test]
fn test_far_off_header_is_placed_by_distinctive_line() {
    let mut original = String::new();
    for i in 0..40 {
        original.push_str(&format!("line {i}\n"));
    }
    original.push_str("    config = load_settings(path)\n    return config\n");
    let diff = indoc! {"
        @@ -3,2 +3,2 @@
             config = load_settings(path)
        -    return config
        +    return config.validated()
    "};
    let outcome = run_pipeline(diff, Some(&original), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert!(outcome.new_content.ends_with("    return config.validated()\n"));
    assert_eq!(strategy(&outcome.result.hunks[&1]), Some("strict"));
}

#[test]
fn test_only_the_claimed_copy_of_a_repeated_block_changes() {
    let block = indoc! {"
        def handler(event):
            if event is None:
                return
            process(event)
            log(event)
            return True
    "};
    let mut original = String::new();
    for i in 1..10 {
        original.push_str(&format!("# filler {i}\n"));
    }
    original.push_str(block); // lines 10-15
    for i in 16..20 {
        original.push_str(&format!("# filler {i}\n"));
    }
    original.push_str(block); // lines 20-25

    let diff = indoc! {"
        @@ -10,6 +10,6 @@
         def handler(event):
             if event is None:
                 return
        -    process(event)
        +    process(event, strict=True)
             log(event)
             return True
    "};
    let outcome = run_pipeline(diff, Some(&original), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);

    let lines: Vec<&str> = outcome.new_content.lines().collect();
    assert_eq!(lines[12], "    process(event, strict=True)");
    assert_eq!(lines[22], "    process(event)");
    assert_eq!(
        lines.iter().filter(|l| l.contains("strict=True")).count(),
        1
    );
}

#[test]
fn test_hunk_offsets_follow_earlier_growth() {
    let original: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    let diff = indoc! {"
        @@ -2,1 +2,4 @@
        -line 2
        +two a
        +two b
        +two c
        +two d
        @@ -8,1 +11,1 @@
        -line 8
        +EIGHT
    "};
    let outcome = run_pipeline(diff, Some(&original), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(
        outcome.result.hunks[&2],
        HunkStatus::Succeeded {
            strategy: "exact",
            offset: 10,
            confidence: 1.0
        }
    );
    assert!(outcome.new_content.contains("line 7\nEIGHT\nline 9\n"));
}

#[test]
fn test_pure_insertions() {
    let options = PipelineOptions::default();

    let past_end = run_pipeline("@@ -10,0 +11,1 @@\n+c\n", Some("a\nb\n"), &options);
    assert_eq!(past_end.new_content, "a\nb\nc\n");
    assert_eq!(strategy(&past_end.result.hunks[&1]), Some("insertion"));

    let at_top = run_pipeline("@@ -0,0 +1,1 @@\n+header\n", Some("a\nb\n"), &options);
    assert_eq!(at_top.new_content, "header\na\nb\n");

    let after_first = run_pipeline("@@ -1,0 +2,1 @@\n+a2\n", Some("a\nb\n"), &options);
    assert_eq!(after_first.new_content, "a\na2\nb\n");
}

#[test]
fn test_file_creation_without_original() {
    let diff = "--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n";
    let outcome = run_pipeline(diff, None, &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(outcome.new_content, "hello\nworld\n");
}

#[test]
fn test_line_endings_and_final_newline_are_preserved() {
    let options = PipelineOptions::default();

    let crlf = run_pipeline("@@ -2,1 +2,1 @@\r\n-b\r\n+B\r\n", Some("a\r\nb\r\nc\r\n"), &options);
    assert_eq!(crlf.new_content, "a\r\nB\r\nc\r\n");

    let no_eol = run_pipeline("@@ -2,1 +2,1 @@\n-b\n+B\n", Some("a\nb"), &options);
    assert_eq!(no_eol.new_content, "a\nB");

    let marker = "@@ -2,1 +2,1 @@\n-b\n+B\n\\ No newline at end of file\n";
    let stripped = run_pipeline(marker, Some("a\nb\n"), &options);
    assert_eq!(stripped.new_content, "a\nB");
}

#[test]
fn test_mixed_line_endings_survive_on_untouched_lines() {
    let options = PipelineOptions::default();
    let diff = "@@ -3,1 +3,1 @@\n-c\n+C\n";

    let crlf_middle = run_pipeline(diff, Some("a\nb\r\nc\n"), &options);
    assert_eq!(crlf_middle.new_content, "a\nb\r\nC\n");

    let crlf_first = run_pipeline(diff, Some("a\r\nb\nc\n"), &options);
    assert_eq!(crlf_first.new_content, "a\r\nb\nC\n");

    let again = run_pipeline(diff, Some(&crlf_first.new_content), &options);
    assert_eq!(again.result.already_applied(), vec![1]);
    assert_eq!(again.new_content, crlf_first.new_content);
}

#[test]
fn test_duplicate_guard_is_refused_and_reported() {
    let original = indoc! {r#"
        def load(path):
            if path is None:
                return
            log("loading")
            data = read(path)
            return data
    "#};
    let diff = indoc! {"
        @@ -9,1 +9,3 @@
        +    if path is None:
        +        return
             data = read(path)
    "};
    let outcome = run_pipeline(diff, Some(original), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Partial);
    assert_eq!(outcome.new_content, original);

    let failures = outcome.result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, HunkErrorKind::DuplicationRisk);
    assert!(failures[0].details.contains("line(s) 5"));

    let feedback = outcome.result.model_feedback.unwrap();
    assert!(feedback.starts_with("1 hunk(s) could not be applied:"));
    assert!(feedback.contains("- Hunk 1 (duplication_risk):"));
    assert!(feedback.ends_with("Regenerate hunks 1 with ≥5 context lines using current file content."));
}

#[test]
fn test_unresolvable_hunk_does_not_stop_its_siblings() {
    let diff = "@@ -1,1 +1,1 @@\n-a\n+A\n@@ -3,1 +3,1 @@\n-zzz\n+ZZZ\n";
    let outcome = run_pipeline(diff, Some("a\nb\nc\n"), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Partial);
    assert_eq!(outcome.new_content, "A\nb\nc\n");
    assert_eq!(outcome.result.succeeded(), vec![1]);
    assert_eq!(outcome.result.failed(), vec![2]);
    assert_eq!(outcome.result.failures()[0].kind, HunkErrorKind::HunkUnresolvable);
    assert!(outcome
        .result
        .model_feedback
        .unwrap()
        .contains("Regenerate hunks 2 "));
}

#[test]
fn test_unreadable_header_fails_its_hunk_and_keeps_ordinals() {
    let diff = "@@ -1,1 +1,1 @@\n-a\n+A\n@@ -2,x +2,1 @@\n-b\n+B\n@@ -3,1 +3,1 @@\n-c\n+C\n";
    let outcome = run_pipeline(diff, Some("a\nb\nc\n"), &PipelineOptions::default());

    assert_eq!(outcome.result.status, PipelineStatus::Partial);
    assert_eq!(outcome.new_content, "A\nb\nC\n");
    assert_eq!(outcome.result.succeeded(), vec![1, 3]);
    assert_eq!(outcome.result.failed(), vec![2]);
    let failures = outcome.result.failures();
    assert_eq!(failures[0].kind, HunkErrorKind::MalformedHeader);
    assert!(failures[0].details.contains("@@ -2,x +2,1 @@"));

    let feedback = outcome.result.model_feedback.unwrap();
    assert!(feedback.contains("- Hunk 2 (malformed_header):"));
    assert!(feedback.contains("Regenerate hunks 2 "));
}

#[test]
fn test_unparseable_diff_is_an_error_result() {
    let outcome = run_pipeline("no hunks here\n", Some("x\n"), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Error);
    assert_eq!(
        outcome.result.error,
        Some(FatalError::Parse(ParseError::NoHunks))
    );
    assert!(outcome.result.hunks.is_empty());
    assert_eq!(outcome.new_content, "x\n");
}

#[test]
fn test_overlapping_hunks_without_merging() {
    let original: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    let diff = indoc! {"
        @@ -5,4 +5,4 @@
         line 5
        -line 6
        +SIX
         line 7
         line 8
        @@ -7,4 +7,4 @@
         line 7
         line 8
        -line 9
        +NINE
         line 10
    "};

    let merged = run_pipeline(diff, Some(&original), &PipelineOptions::default());
    let separate = run_pipeline(
        diff,
        Some(&original),
        &PipelineOptions::builder().merge_overlaps(false).build(),
    );
    assert_eq!(merged.new_content, separate.new_content);

    let offset = |status: &HunkStatus| match status {
        HunkStatus::Succeeded { offset, .. } => Some(*offset),
        _ => None,
    };
    assert_eq!(offset(&merged.result.hunks[&2]), Some(4));
    assert_eq!(offset(&separate.result.hunks[&2]), Some(6));
}

#[test]
fn test_high_threshold_rejects_fuzzy_placements() {
    let options = PipelineOptions::builder().confidence_threshold(0.95).build();
    let outcome = run_pipeline("@@ -5,1 +5,1 @@\n-b\n+B\n", Some("a\nb\nc\n"), &options);
    assert_eq!(outcome.result.status, PipelineStatus::Partial);
    assert_eq!(outcome.new_content, "a\nb\nc\n");
}
