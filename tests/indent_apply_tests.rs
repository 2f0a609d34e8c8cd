use diffmend::{
    apply_replacement, detect_indentation_style, normalize_hunk_indentation, parse_patch,
    run_pipeline, verify_changes_applied, verify_hunk_changes, IndentStyle, PipelineOptions,
    PipelineStatus,
};
use indoc::indoc;

fn v(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_space_indented_hunk_lands_in_tab_indented_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let original = "fn main() {\n\tlet x = 1;\n\tif x > 0 {\n\t\tprintln!(\"pos\");\n\t}\n}\n";
    let diff = indoc! {r#"
        --- a/src/main.rs
        +++ b/src/main.rs
        @@ -3,3 +3,3 @@
             if x > 0 {
        -        println!("pos");
        +        println!("positive");
             }
    "#};
    let outcome = run_pipeline(diff, Some(original), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(
        outcome.new_content,
        "fn main() {\n\tlet x = 1;\n\tif x > 0 {\n\t\tprintln!(\"positive\");\n\t}\n}\n"
    );
}

#[test]
fn test_under_indented_hunk_is_rebased_onto_the_file() {
    let original = indoc! {"
        class Account:
            def balance(self):
                total = sum(self.entries)
                return total
    "};
    // The model dropped the method's indentation entirely.
    let diff = indoc! {"
        @@ -3,2 +3,2 @@
         total = sum(self.entries)
        -return total
        +return round(total, 2)
    "};
    let outcome = run_pipeline(diff, Some(original), &PipelineOptions::default());
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(
        outcome.new_content,
        indoc! {"
            class Account:
                def balance(self):
                    total = sum(self.entries)
                    return round(total, 2)
        "}
    );
}

#[test]
fn test_indentation_left_alone_when_disabled() {
    let original = "if x:\n    y = 1\n";
    let diff = "@@ -2,1 +2,1 @@\n-y = 1\n+y = 2\n";
    let options = PipelineOptions::builder().normalize_indentation(false).build();
    let outcome = run_pipeline(diff, Some(original), &options);
    assert_eq!(outcome.result.status, PipelineStatus::Success);
    assert_eq!(outcome.new_content, "if x:\ny = 2\n");
}

#[test]
fn test_hunk_reindented_to_two_space_style() {
    let style = detect_indentation_style("function f() {\n  if (a) {\n    b();\n  }\n}\n");
    assert_eq!(
        style,
        IndentStyle {
            uses_spaces: true,
            indent_size: 2
        }
    );
    let diff = indoc! {"
        @@ -2,3 +2,3 @@
             if (a) {
        -        b();
        +        c();
             }
    "};
    let hunk = &parse_patch(diff).unwrap().hunks[0];
    let normalized = normalize_hunk_indentation(hunk, style);
    assert_eq!(normalized.old_block, vec!["  if (a) {", "    b();", "  }"]);
    assert_eq!(normalized.added_lines, vec!["    c();"]);
}

#[test]
fn test_join_does_not_double_blank_lines() {
    let mut lines = v(&["a", "", "b"]);
    let splice = apply_replacement(&mut lines, 0, 1, &v(&["A", ""]));
    assert_eq!(lines, v(&["A", "", "b"]));
    assert_eq!(splice.delta, 0);
    assert_eq!(splice.replaced, v(&["a"]));
}

#[test]
fn test_blank_lines_inside_replacement_are_kept() {
    let mut lines = v(&["a", "b"]);
    let splice = apply_replacement(&mut lines, 0, 1, &v(&["A", "", "", "A2"]));
    assert_eq!(lines, v(&["A", "", "", "A2", "b"]));
    assert_eq!(splice.delta, 3);
}

#[test]
fn test_offset_past_end_is_clamped_and_cr_stripped() {
    let mut lines = v(&["a"]);
    let splice = apply_replacement(&mut lines, 5, 3, &v(&["z\r"]));
    assert_eq!(lines, v(&["a", "z"]));
    assert_eq!(splice.offset, 1);
    assert!(splice.replaced.is_empty());
    assert_eq!(splice.delta, 1);
}

#[test]
fn test_whole_file_verification() {
    let original = "x = 1\ny = 2\n";
    let modified = "x = 1\nx = 1\ny = 2\n";
    let diff = "@@ -1,1 +1,2 @@\n x = 1\n+x = 1\n";
    assert!(verify_changes_applied(original, modified, diff));
    assert!(!verify_changes_applied(original, original, diff));
    // A diff that changes nothing never verifies.
    assert!(!verify_changes_applied(original, modified, "@@ -1,1 +1,1 @@\n x = 1\n"));

    // Per hunk, a line that was already in the file proves nothing.
    let patch = parse_patch(diff).unwrap();
    let results = verify_hunk_changes(original, modified, &patch.hunks);
    assert!(!results[&1].0);
}

#[test]
fn test_per_hunk_verification_reports() {
    let original = "a\nb\nc\nd\n";
    let modified = "a\nB\nc\nd\n";
    let patch = parse_patch("@@ -2,1 +2,1 @@\n-b\n+B\n@@ -4,1 +4,1 @@\n-d\n+D\n").unwrap();
    let results = verify_hunk_changes(original, modified, &patch.hunks);
    assert!(results[&1].0);
    assert!(!results[&2].0);
    assert!(results[&1].1.contains("'B'"));
}
