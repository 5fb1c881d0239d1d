//! Removes stylesheet rules that no markup document can reach.
//!
//! The core takes loaded markup and stylesheet text and returns the reduced
//! stylesheet text; it never touches the file system. With the `cli` feature
//! the crate also provides the file handling used by the `css-purge` binary.
//!
//! ```
//! let css = css_purge::purge_css(
//!     &[r#"<div class="box"></div>"#],
//!     ".box{color:red} .missing{color:blue}",
//! );
//! assert_eq!(css, ".box{color:red}");
//! ```

pub mod args;
pub mod config;
pub mod errors;
pub mod markup;
pub mod matcher;
pub mod purger;
pub mod reducer;
pub mod report;
pub mod safelist;
pub mod selector;
pub mod serializer;
pub mod stylesheet;

#[cfg(feature = "cli")]
mod runner;

pub use args::{Cli, Commands, PipeArgs, PurgeArgs};
pub use config::PurgeConfig;
pub use errors::{PurgeError, Result};
pub use markup::{scan_corpus, scan_document, ExtractedTokens, ExtractorMode, MarkupCorpus, MarkupDocument, ScannerOptions};
pub use matcher::{is_reachable, Matcher};
pub use purger::{purge_css, PurgeOptions, PurgeOutput, Purger};
pub use reducer::{reduce, ReduceOptions, Reduction};
pub use report::{PurgeReport, ReportBuilder};
pub use safelist::{Safelist, SafelistEntry};
pub use serializer::serialize;
pub use stylesheet::{parse_stylesheet, Node, Stylesheet};

#[cfg(feature = "cli")]
pub use runner::{
    collect_files_with_security, handle_pipe_command, purge, validate_input_file, validate_output_path,
    OutputPlan, PerformanceStats, PurgeResult, SecurityConfig,
};
