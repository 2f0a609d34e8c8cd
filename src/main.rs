use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use diffmend::{
    apply_patch_to_file, parse_patches, validate_patch, FilePatch, PipelineOptions,
    PipelineResult, WorkContext,
};
use env_logger::Builder;
use log::{error, info, warn, Level, LevelFilter};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("{} {:?}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if !args.project_root.is_dir() {
        return Err(anyhow!(
            "Project root '{}' not found or is not a directory.",
            args.project_root.display()
        ));
    }
    if !(0.0..=1.0).contains(&args.threshold) {
        return Err(anyhow!("Confidence threshold must be between 0.0 and 1.0."));
    }

    let content = fs::read_to_string(&args.diff_file)
        .with_context(|| format!("Failed to read diff file '{}'", args.diff_file.display()))?;
    let patches = parse_patches(&content)?;
    if args.target.is_some() && patches.len() > 1 {
        return Err(anyhow!(
            "--target can only be used with a single-file diff ({} files found).",
            patches.len()
        ));
    }

    let options = PipelineOptions::builder()
        .confidence_threshold(args.threshold)
        .merge_overlaps(!args.no_merge)
        .normalize_indentation(!args.no_indent)
        .build();
    let ctx = WorkContext::new(&args.project_root);

    info!("");
    info!("Found {} file patch(es) to process.", patches.len());

    let mut failed_files = 0;
    for (i, patch) in patches.iter().enumerate() {
        let target = match (&args.target, patch.target_path()) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => path.to_path_buf(),
            (None, None) => {
                return Err(anyhow!(
                    "Patch {} does not name a target file; pass --target.",
                    i + 1
                ))
            }
        };
        info!("");
        info!(">>> Operation {}/{}: {}", i + 1, patches.len(), target.display());

        let result = if args.dry_run {
            dry_run(&ctx, patch, &target, &options)?
        } else {
            apply_patch_to_file(&ctx, patch, &target, &options, &writable)
                .with_context(|| format!("Failed to apply patch for: {}", target.display()))?
                .result
        };

        if !result.is_success() {
            failed_files += 1;
            error!("--- FAILED to apply patch for: {}", target.display());
            report_failures(&result);
        }
    }

    info!("\n--- Summary ---");
    info!("Files patched cleanly: {}", patches.len() - failed_files);
    info!("Files with failures:   {}", failed_files);
    if args.dry_run {
        info!("DRY RUN completed. No files were modified.");
    }
    if failed_files > 0 {
        return Err(anyhow!(
            "Completed with {} file(s) not fully patched.",
            failed_files
        ));
    }
    Ok(())
}

fn dry_run(
    ctx: &WorkContext,
    patch: &FilePatch,
    target: &Path,
    options: &PipelineOptions,
) -> Result<PipelineResult> {
    let report = validate_patch(ctx, patch, target, options)
        .with_context(|| format!("Failed to validate patch for: {}", target.display()))?;
    if let Some(preview) = &report.preview {
        println!("----- Proposed Changes for {} -----", target.display());
        print!("{}", preview);
        println!("------------------------------------");
    }
    Ok(report.result)
}

/// Refuses read-only files instead of failing halfway through a write.
fn writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(true)
}

fn report_failures(result: &PipelineResult) {
    if let Some(error) = &result.error {
        warn!("  {}", error);
    }
    for failure in result.failures() {
        warn!("  - {}", failure);
    }
    if let Some(feedback) = &result.model_feedback {
        println!("{}", feedback);
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Apply model-generated unified diffs to a project, tolerating stale line numbers and context.",
    long_about = "Places each hunk with a fixed chain of strategies (exact, context-anchored, fuzzy, distinctive-line), refuses placements that would duplicate guard clauses, and verifies every change. Failed hunks come with instructions for regenerating them."
)]
struct Args {
    /// File containing the unified diff (markdown fences are fine).
    diff_file: PathBuf,
    /// Project root every target path is resolved against.
    project_root: PathBuf,
    /// Target file, overriding the path in the diff header.
    #[arg(long)]
    target: Option<PathBuf>,
    #[arg(
        short = 'n',
        long,
        help = "Validate against a scratch copy and print the resulting diff; don't modify files."
    )]
    dry_run: bool,
    #[arg(short = 't', long, default_value_t = 0.5, help = "Minimum confidence (0.0 to 1.0) for placing a hunk.")]
    threshold: f64,
    /// Place overlapping hunks one by one instead of merging them.
    #[arg(long)]
    no_merge: bool,
    /// Keep hunk indentation as written.
    #[arg(long)]
    no_indent: bool,
    #[arg(short, long, action = clap::ArgAction::Count, long_help = "Increase logging verbosity.\n-v for info, -vv for debug, -vvv for trace.")]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .filter_level(level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();
}
