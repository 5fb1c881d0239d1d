//! File handling around the purger: glob resolution, reads, security checks
//! and atomic writes for the `purge` and `pipe` commands.

use crate::args::{PipeArgs, PurgeArgs};
use crate::config::PurgeConfig;
use crate::errors::{PurgeError, Result};
use crate::markup::{MarkupCorpus, MarkupDocument};
use crate::purger::{PurgeOutput, Purger};
use crate::report::PurgeReport;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Security configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum file size in bytes (default: 10MB)
    pub max_file_size: u64,
    /// Allow symbolic links
    pub allow_symlinks: bool,
    /// Working directory for path traversal checks
    pub working_directory: PathBuf,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            allow_symlinks: false,
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Performance statistics
#[derive(Debug, Clone, Default)]
pub struct PerformanceStats {
    pub total_duration: Duration,
    pub read_duration: Duration,
    pub purge_duration: Duration,
    pub files_per_second: f64,
    pub bytes_processed: u64,
}

/// Result of a purge run
#[derive(Debug)]
pub struct PurgeResult {
    /// One entry per input stylesheet, in input order
    pub outputs: Vec<(PathBuf, PurgeOutput)>,
    /// Files written (empty on a dry run)
    pub written: Vec<PathBuf>,
    pub total_files_processed: usize,
    pub total_rejected: usize,
    pub performance_stats: Option<PerformanceStats>,
}

/// Where purged stylesheets go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPlan {
    /// One stylesheet, one file
    Single(PathBuf),
    /// Several stylesheets joined into one `.css` file
    Concatenate(PathBuf),
    /// Several stylesheets, each written under its own name
    Directory(PathBuf),
}

impl OutputPlan {
    pub fn new(output: &Path, stylesheet_count: usize) -> Self {
        let is_css = output
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("css"));
        match stylesheet_count {
            0 | 1 => OutputPlan::Single(output.to_path_buf()),
            _ if is_css => OutputPlan::Concatenate(output.to_path_buf()),
            _ => OutputPlan::Directory(output.to_path_buf()),
        }
    }

    /// Default report location next to the output
    fn report_path(&self) -> PathBuf {
        match self {
            OutputPlan::Single(path) | OutputPlan::Concatenate(path) => path.with_extension("report.json"),
            OutputPlan::Directory(dir) => dir.join("purge-report.json"),
        }
    }
}

/// Main purge entry point
pub async fn purge(args: PurgeArgs) -> Result<PurgeResult> {
    let start_time = Instant::now();
    let mut stats = PerformanceStats::default();

    // Validate arguments
    args.validate().map_err(PurgeError::InvalidInput)?;

    let config = load_config(&args)?;
    if config.content.is_empty() {
        return Err(PurgeError::InvalidInput("No content patterns configured".to_string()));
    }
    if config.css.is_empty() {
        return Err(PurgeError::InvalidInput("No stylesheets configured".to_string()));
    }
    let plan = match &config.output {
        Some(output) => Some(OutputPlan::new(output, config.css.len())),
        None if args.dry_run => None,
        None => return Err(PurgeError::InvalidInput("No output path configured".to_string())),
    };
    let options = config.to_options()?;
    let security = SecurityConfig::default();

    // Security: Validate output paths are safe
    if let Some(output) = &config.output {
        validate_output_path(output, &security)?;
    }
    if let Some(report) = &args.report {
        validate_output_path(report, &security)?;
    }

    if let Some(jobs) = args.jobs {
        configure_thread_pool(jobs);
    }

    tracing::info!(
        patterns = ?config.content,
        stylesheets = config.css.len(),
        max_file_size_mb = security.max_file_size / (1024 * 1024),
        "starting purge"
    );

    // Collect files matching the patterns
    let files = collect_files_with_security(&config.content, &config.exclude, &security)?;
    if files.is_empty() {
        return Err(PurgeError::NoFilesFound);
    }
    stats.bytes_processed = files.iter().map(|f| f.1).sum();
    tracing::info!(
        files = files.len(),
        total_mb = %format!("{:.2}", stats.bytes_processed as f64 / (1024.0 * 1024.0)),
        "found markup files"
    );

    let progress_bar = create_progress_bar(files.len() as u64, args.verbose);

    // Read the corpus and the stylesheets
    let read_start = Instant::now();
    let file_paths: Vec<PathBuf> = files.into_iter().map(|(path, _)| path).collect();
    let corpus = read_corpus(&file_paths, progress_bar.as_ref())?;
    let stylesheets = read_stylesheets(&config.css, &security).await?;
    stats.read_duration = read_start.elapsed();

    if let Some(ref pb) = progress_bar {
        pb.set_message("Purging stylesheets...");
    }

    let purge_start = Instant::now();
    let purger = Purger::new(options);
    let outputs: Vec<(PathBuf, PurgeOutput)> = config
        .css
        .iter()
        .cloned()
        .zip(purger.purge_many(&corpus, &stylesheets).into_iter().map(|(_, output)| output))
        .collect();
    stats.purge_duration = purge_start.elapsed();

    // Calculate final statistics
    stats.total_duration = start_time.elapsed();
    stats.files_per_second = corpus.len() as f64 / stats.total_duration.as_secs_f64().max(f64::EPSILON);

    let total_rejected = outputs.iter().map(|(_, o)| o.report.rejected_count()).sum();

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("✓ Complete ({:.1} files/sec)", stats.files_per_second));
    }

    // Write output files if not in dry-run mode
    let mut written = Vec::new();
    if let (Some(plan), false) = (&plan, args.dry_run) {
        written = write_outputs(plan, &outputs)?;
        let report_path = args
            .report
            .clone()
            .or_else(|| config.rejected.then(|| plan.report_path()));
        if let Some(report_path) = report_path {
            write_report(&report_path, &outputs)?;
            written.push(report_path);
        }
    }

    tracing::info!(
        files = corpus.len(),
        stylesheets = outputs.len(),
        rejected = total_rejected,
        total_secs = %format!("{:.2}", stats.total_duration.as_secs_f64()),
        read_secs = %format!("{:.2}", stats.read_duration.as_secs_f64()),
        purge_secs = %format!("{:.2}", stats.purge_duration.as_secs_f64()),
        "purge complete"
    );

    Ok(PurgeResult {
        outputs,
        written,
        total_files_processed: corpus.len(),
        total_rejected,
        performance_stats: Some(stats),
    })
}

/// Config file (if any) with the command line merged over it
fn load_config(args: &PurgeArgs) -> Result<PurgeConfig> {
    let cli = args.to_config();
    match &args.config {
        Some(path) => Ok(PurgeConfig::from_file(path)?.merge(cli)),
        None => Ok(cli),
    }
}

fn configure_thread_pool(jobs: usize) {
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
        tracing::debug!(error = %e, "thread pool already initialised");
    }
}

fn create_progress_bar(len: u64, verbose: bool) -> Option<ProgressBar> {
    if verbose {
        return None;
    }
    let pb = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message("Scanning markup...");
    Some(pb)
}

/// Validate that a path is safe (no path traversal)
pub fn validate_output_path(path: &Path, security: &SecurityConfig) -> Result<()> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let working_dir = security.working_directory.canonicalize()
        .unwrap_or_else(|_| security.working_directory.clone());

    // Relative paths must stay inside the working directory
    let escapes = path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));
    if path.is_relative() && (escapes || !working_dir.join(&canonical).starts_with(&working_dir)) {
        return Err(PurgeError::SecurityError(format!(
            "Output path '{}' appears to use path traversal",
            path.display()
        )));
    }

    Ok(())
}

/// Check if a file is safe to read
pub fn validate_input_file(path: &Path, security: &SecurityConfig) -> Result<()> {
    // Check for symlinks if not allowed
    if !security.allow_symlinks && path.is_symlink() {
        return Err(PurgeError::SecurityError(format!(
            "Symbolic link not allowed: {}",
            path.display()
        )));
    }

    // If it's a symlink and we allow them, validate the target
    if security.allow_symlinks && path.is_symlink() {
        let target = path.canonicalize().map_err(|e| {
            PurgeError::SecurityError(format!("Cannot resolve symlink '{}': {}", path.display(), e))
        })?;
        let working_dir = security.working_directory.canonicalize()
            .unwrap_or_else(|_| security.working_directory.clone());

        if !target.starts_with(&working_dir) {
            return Err(PurgeError::SecurityError(format!(
                "Symlink target '{}' is outside working directory",
                target.display()
            )));
        }
    }

    // Check file size
    let metadata = fs::metadata(path).map_err(|e| PurgeError::InputError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if metadata.len() > security.max_file_size {
        return Err(PurgeError::SecurityError(format!(
            "File '{}' exceeds maximum size limit ({} MB > {} MB)",
            path.display(),
            metadata.len() / (1024 * 1024),
            security.max_file_size / (1024 * 1024)
        )));
    }

    Ok(())
}

/// Collect files matching the given patterns with security checks
pub fn collect_files_with_security(
    patterns: &[String],
    exclude_patterns: &[String],
    security: &SecurityConfig,
) -> Result<Vec<(PathBuf, u64)>> {
    let excludes = exclude_patterns
        .iter()
        .map(|p| glob::Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut files = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut skipped_count = 0;

    for pattern in patterns {
        for entry in glob::glob(pattern)? {
            let path = entry?;

            if excludes.iter().any(|p| p.matches_path(&path)) || path.is_dir() {
                continue;
            }

            if let Err(e) = validate_input_file(&path, security) {
                tracing::warn!(error = %e, "skipping file");
                skipped_count += 1;
                continue;
            }

            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if seen.insert(path.clone()) {
                files.push((path, size));
            }
        }
    }

    if skipped_count > 0 {
        tracing::warn!(skipped = skipped_count, "skipped files due to security constraints");
    }

    Ok(files)
}

/// Read markup files in parallel into a corpus, keeping the given order
fn read_corpus(files: &[PathBuf], progress_bar: Option<&ProgressBar>) -> Result<MarkupCorpus> {
    let processed = AtomicUsize::new(0);

    let documents = files
        .par_iter()
        .map(|path| -> Result<MarkupDocument> {
            let bytes = fs::read(path).map_err(|e| PurgeError::InputError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            if let Some(pb) = progress_bar {
                let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_position(count as u64);
                pb.set_message(format!(
                    "Scanning: {}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                ));
            }

            Ok(MarkupDocument::new(
                path.display().to_string(),
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MarkupCorpus::new(documents))
}

async fn read_stylesheets(paths: &[PathBuf], security: &SecurityConfig) -> Result<Vec<(String, String)>> {
    let mut stylesheets = Vec::with_capacity(paths.len());
    for path in paths {
        validate_input_file(path, security)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| PurgeError::InputError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        stylesheets.push((path.display().to_string(), String::from_utf8_lossy(&bytes).into_owned()));
    }
    Ok(stylesheets)
}

/// Write purged stylesheets according to the output plan
fn write_outputs(plan: &OutputPlan, outputs: &[(PathBuf, PurgeOutput)]) -> Result<Vec<PathBuf>> {
    let targets: Vec<(PathBuf, String)> = match plan {
        OutputPlan::Single(path) => vec![(
            path.clone(),
            outputs.first().map(|(_, o)| o.css.clone()).unwrap_or_default(),
        )],
        OutputPlan::Concatenate(path) => {
            let mut css = String::new();
            for (_, output) in outputs {
                css.push_str(&output.css);
                if !css.is_empty() && !css.ends_with('\n') {
                    css.push('\n');
                }
            }
            vec![(path.clone(), css)]
        }
        OutputPlan::Directory(dir) => {
            let mut seen = std::collections::HashSet::new();
            let mut targets = Vec::with_capacity(outputs.len());
            for (input, output) in outputs {
                let name = input.file_name().ok_or_else(|| {
                    PurgeError::InvalidInput(format!("Stylesheet path '{}' has no file name", input.display()))
                })?;
                if !seen.insert(name.to_os_string()) {
                    return Err(PurgeError::InvalidInput(format!(
                        "Two stylesheets named '{}' would be written to the same file",
                        name.to_string_lossy()
                    )));
                }
                targets.push((dir.join(name), output.css.clone()));
            }
            targets
        }
    };

    let mut written = Vec::with_capacity(targets.len());
    for (path, css) in targets {
        write_file(&path, &css)?;
        written.push(path);
    }
    Ok(written)
}

fn write_report(path: &Path, outputs: &[(PathBuf, PurgeOutput)]) -> Result<()> {
    let reports: Vec<&PurgeReport> = outputs.iter().map(|(_, o)| &o.report).collect();
    let content = serde_json::to_string_pretty(&reports)?;
    write_file(path, &content)
}

/// Create parent directories and write atomically
fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_atomic(path, content).map_err(|e| PurgeError::OutputError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Write file atomically by writing to temp file then renaming
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    fs::rename(&temp_path, path)
}

/// Handle pipe command - read a stylesheet from stdin, write the purged one to stdout
pub async fn handle_pipe_command(args: PipeArgs) -> Result<()> {
    use tokio::io::{self, AsyncReadExt, AsyncWriteExt};

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|e| PurgeError::InputError {
            path: "stdin".to_string(),
            message: e.to_string(),
        })?;

    let config = args.to_config();
    let options = config.to_options()?;

    let corpus = if config.content.is_empty() {
        tracing::warn!("no content patterns given; only safelisted rules will be kept");
        MarkupCorpus::default()
    } else {
        let security = SecurityConfig::default();
        let files = collect_files_with_security(&config.content, &config.exclude, &security)?;
        if files.is_empty() {
            return Err(PurgeError::NoFilesFound);
        }
        let paths: Vec<PathBuf> = files.into_iter().map(|(path, _)| path).collect();
        read_corpus(&paths, None)?
    };

    let output = Purger::new(options).purge(&corpus, &input);

    let mut stdout = io::stdout();
    stdout
        .write_all(output.css.as_bytes())
        .await
        .map_err(|e| PurgeError::OutputError {
            path: "stdout".to_string(),
            message: e.to_string(),
        })?;

    stdout.flush().await.map_err(|e| PurgeError::OutputError {
        path: "stdout".to_string(),
        message: e.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_plan() {
        assert_eq!(OutputPlan::new(Path::new("out.css"), 1), OutputPlan::Single(PathBuf::from("out.css")));
        assert_eq!(OutputPlan::new(Path::new("out"), 1), OutputPlan::Single(PathBuf::from("out")));
        assert_eq!(OutputPlan::new(Path::new("all.CSS"), 2), OutputPlan::Concatenate(PathBuf::from("all.CSS")));
        assert_eq!(OutputPlan::new(Path::new("dist"), 3), OutputPlan::Directory(PathBuf::from("dist")));
        assert_eq!(
            OutputPlan::new(Path::new("out.css"), 1).report_path(),
            PathBuf::from("out.report.json")
        );
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.css");
        write_file(&path, ".a{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), ".a{}");
        assert!(!dir.path().join("nested").join("out.css.tmp").exists());
    }

    #[test]
    fn test_output_path_traversal_is_rejected() {
        let security = SecurityConfig::default();
        assert!(validate_output_path(Path::new("../outside.css"), &security).is_err());
        assert!(validate_output_path(Path::new("dist/out.css"), &security).is_ok());
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.html");
        fs::write(&path, "x".repeat(2048)).unwrap();

        let security = SecurityConfig {
            max_file_size: 1024,
            ..SecurityConfig::default()
        };
        assert!(matches!(
            validate_input_file(&path, &security),
            Err(PurgeError::SecurityError(_))
        ));
    }

    #[test]
    fn test_read_corpus_keeps_order_and_tolerates_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.html");
        let second = dir.path().join("b.html");
        fs::write(&first, "<p class=\"one\">").unwrap();
        fs::write(&second, b"<p class=\"two\">\xff").unwrap();

        let corpus = read_corpus(&[first.clone(), second], None).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.documents()[0].source, first.display().to_string());
        assert!(corpus.documents()[1].content.contains("two"));
    }
}
