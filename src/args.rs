use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PurgeConfig;
use crate::markup::ExtractorMode;
use crate::safelist::SafelistEntry;

/// CSS purge CLI - removes stylesheet rules no markup document can reach
#[derive(Parser, Debug)]
#[command(name = "css-purge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Purge stylesheets against markup files
    Purge(PurgeArgs),
    /// Read a stylesheet from stdin and write the purged stylesheet to stdout
    Pipe(PipeArgs),
}

/// Arguments for the purge command
#[derive(Parser, Debug, Clone, Default)]
pub struct PurgeArgs {
    /// Configuration file path (YAML or JSON)
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Path to configuration file (YAML or JSON format)"
    )]
    pub config: Option<PathBuf>,

    /// Markup file patterns (glob patterns supported)
    #[arg(
        short = 'i',
        long = "content",
        value_name = "PATTERN",
        num_args = 1..,
        help = "Markup file patterns to scan for reachable selectors"
    )]
    pub content: Vec<String>,

    /// Stylesheets to purge
    #[arg(
        short = 's',
        long = "css",
        value_name = "PATH",
        num_args = 1..,
        help = "Stylesheets to purge"
    )]
    pub css: Vec<PathBuf>,

    /// Output path
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Output file, or output directory when purging several stylesheets"
    )]
    pub output: Option<PathBuf>,

    /// Safelist entries
    #[arg(
        long = "safelist",
        value_name = "ENTRY",
        num_args = 1..,
        help = "Selectors or names to always keep (name, prefix*, or /regex/)"
    )]
    pub safelist: Vec<String>,

    /// Exclude patterns (glob patterns to exclude)
    #[arg(
        short = 'e',
        long = "exclude",
        value_name = "PATTERN",
        num_args = 0..,
        help = "Patterns to exclude from scanning"
    )]
    pub exclude: Vec<String>,

    /// Report output path (JSON)
    #[arg(
        short = 'r',
        long = "report",
        value_name = "PATH",
        help = "Path where a JSON report of removed selectors will be written"
    )]
    pub report: Option<PathBuf>,

    /// Remove unused @keyframes
    #[arg(
        long = "keyframes",
        default_value_t = false,
        help = "Remove @keyframes not referenced by any kept rule"
    )]
    pub keyframes: bool,

    /// Remove unused @font-face
    #[arg(
        long = "font-face",
        default_value_t = false,
        help = "Remove @font-face blocks not referenced by any kept rule"
    )]
    pub font_face: bool,

    /// Word extractor
    #[arg(
        short = 'w',
        long = "words",
        default_value_t = false,
        help = "Also treat every word in the markup as a possible class, id or tag name"
    )]
    pub words: bool,

    /// Verbose output
    #[arg(
        short = 'v',
        long = "verbose",
        default_value_t = false,
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Number of parallel threads to use
    #[arg(
        short = 'j',
        long = "jobs",
        value_name = "NUM",
        help = "Number of parallel threads to use (defaults to number of CPU cores)"
    )]
    pub jobs: Option<usize>,

    /// Dry run (don't write output files)
    #[arg(
        long = "dry-run",
        default_value_t = false,
        help = "Perform the purge but don't write output files"
    )]
    pub dry_run: bool,
}

/// Arguments for the pipe command
#[derive(Parser, Debug, Clone, Default)]
pub struct PipeArgs {
    /// Markup file patterns (glob patterns supported)
    #[arg(
        short = 'i',
        long = "content",
        value_name = "PATTERN",
        num_args = 1..,
        help = "Markup file patterns to scan for reachable selectors"
    )]
    pub content: Vec<String>,

    /// Safelist entries
    #[arg(
        long = "safelist",
        value_name = "ENTRY",
        num_args = 1..,
        help = "Selectors or names to always keep (name, prefix*, or /regex/)"
    )]
    pub safelist: Vec<String>,

    /// Word extractor
    #[arg(
        short = 'w',
        long = "words",
        default_value_t = false,
        help = "Also treat every word in the markup as a possible class, id or tag name"
    )]
    pub words: bool,
}

impl PurgeArgs {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        // Without a config file the inputs must come from the command line
        if self.config.is_none() {
            if self.content.is_empty() {
                return Err("At least one content pattern must be provided".to_string());
            }
            if self.css.is_empty() {
                return Err("At least one stylesheet must be provided".to_string());
            }
            if self.output.is_none() && !self.dry_run {
                return Err("An output path must be provided".to_string());
            }
        }

        // Check that output paths are not the same
        if let (Some(output), Some(report)) = (&self.output, &self.report) {
            if output == report {
                return Err("Output and report paths must be different".to_string());
            }
        }

        // Don't overwrite an input stylesheet
        if let Some(output) = &self.output {
            if self.css.contains(output) {
                return Err(format!("Output path '{}' is also an input stylesheet", output.display()));
            }
        }

        // Validate number of jobs if specified
        if let Some(jobs) = self.jobs {
            if jobs == 0 {
                return Err("Number of jobs must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// The command line as a configuration layer, to merge over a config file
    pub fn to_config(&self) -> PurgeConfig {
        PurgeConfig {
            content: self.content.clone(),
            css: self.css.clone(),
            output: self.output.clone(),
            exclude: self.exclude.clone(),
            safelist: self.safelist.iter().map(|s| SafelistEntry::parse(s)).collect(),
            keyframes: self.keyframes,
            font_face: self.font_face,
            rejected: self.report.is_some(),
            extractor: if self.words { ExtractorMode::Words } else { ExtractorMode::Structured },
            ..PurgeConfig::default()
        }
    }
}

impl PipeArgs {
    pub fn to_config(&self) -> PurgeConfig {
        PurgeConfig {
            content: self.content.clone(),
            safelist: self.safelist.iter().map(|s| SafelistEntry::parse(s)).collect(),
            extractor: if self.words { ExtractorMode::Words } else { ExtractorMode::Structured },
            ..PurgeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_purge_command() {
        let cli = Cli::try_parse_from([
            "css-purge",
            "purge",
            "--content",
            "views/**/*.fxml",
            "--css",
            "global-style.css",
            "--output",
            "global-style.cleaned.css",
            "--safelist",
            "active",
            "fa-*",
            "--keyframes",
        ])
        .unwrap();

        let Commands::Purge(args) = cli.command else { panic!("expected purge command") };
        assert_eq!(args.content, vec!["views/**/*.fxml"]);
        assert_eq!(args.safelist, vec!["active", "fa-*"]);
        assert!(args.keyframes);
        assert!(args.validate().is_ok());

        let config = args.to_config();
        assert_eq!(config.safelist[1], SafelistEntry::Prefix { prefix: "fa-".to_string() });
    }

    #[test]
    fn test_validate_requires_inputs_without_config() {
        let args = PurgeArgs::default();
        assert!(args.validate().is_err());

        let args = PurgeArgs {
            config: Some(PathBuf::from("purge.yaml")),
            ..PurgeArgs::default()
        };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_conflicting_paths() {
        let base = PurgeArgs {
            content: vec!["*.html".to_string()],
            css: vec![PathBuf::from("a.css")],
            output: Some(PathBuf::from("out.css")),
            ..PurgeArgs::default()
        };
        assert!(base.validate().is_ok());

        let same_report = PurgeArgs {
            report: Some(PathBuf::from("out.css")),
            ..base.clone()
        };
        assert!(same_report.validate().is_err());

        let overwrite_input = PurgeArgs {
            output: Some(PathBuf::from("a.css")),
            ..base.clone()
        };
        assert!(overwrite_input.validate().is_err());

        let no_jobs = PurgeArgs { jobs: Some(0), ..base };
        assert!(no_jobs.validate().unwrap_err().contains("jobs"));
    }
}
