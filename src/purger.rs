//! Purging entry point.
//!
//! Joins the markup scan and the stylesheet parse, which are independent and
//! run in parallel, then reduces and serializes. No file system access happens
//! here; callers hand in loaded text and get text back.

use crate::markup::{scan_corpus, ExtractedTokens, MarkupCorpus, ScannerOptions};
use crate::matcher::Matcher;
use crate::reducer::{reduce, ReduceOptions};
use crate::report::{PurgeReport, ReportBuilder};
use crate::safelist::Safelist;
use crate::serializer::serialize;
use crate::stylesheet::{parse_stylesheet, Stylesheet};
use rayon::prelude::*;

/// Everything that controls a purge
#[derive(Debug, Clone, Default)]
pub struct PurgeOptions {
    pub scanner: ScannerOptions,
    pub safelist: Safelist,
    pub reduce: ReduceOptions,
}

/// Reduced stylesheet text plus what was removed
#[derive(Debug, Clone)]
pub struct PurgeOutput {
    pub css: String,
    pub report: PurgeReport,
}

/// Removes unreachable rules from stylesheets
#[derive(Debug, Clone, Default)]
pub struct Purger {
    options: PurgeOptions,
}

impl Purger {
    pub fn new(options: PurgeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PurgeOptions {
        &self.options
    }

    /// Scan a corpus with this purger's scanner options
    pub fn scan(&self, corpus: &MarkupCorpus) -> ExtractedTokens {
        scan_corpus(corpus, &self.options.scanner)
    }

    /// Purge one stylesheet against a corpus
    pub fn purge(&self, corpus: &MarkupCorpus, css: &str) -> PurgeOutput {
        let (tokens, stylesheet) = rayon::join(|| self.scan(corpus), || parse_stylesheet(css));
        self.finish(&tokens, &stylesheet, css.len(), corpus.len(), None)
    }

    /// Purge several `(label, css)` stylesheets against one corpus.
    ///
    /// The corpus is scanned once; results keep the input order.
    pub fn purge_many(&self, corpus: &MarkupCorpus, stylesheets: &[(String, String)]) -> Vec<(String, PurgeOutput)> {
        let (tokens, parsed) = rayon::join(
            || self.scan(corpus),
            || {
                stylesheets
                    .par_iter()
                    .map(|(_, css)| parse_stylesheet(css))
                    .collect::<Vec<_>>()
            },
        );

        stylesheets
            .par_iter()
            .zip(parsed.par_iter())
            .map(|((label, css), stylesheet)| {
                let output = self.finish(&tokens, stylesheet, css.len(), corpus.len(), Some(label));
                (label.clone(), output)
            })
            .collect()
    }

    fn finish(
        &self,
        tokens: &ExtractedTokens,
        stylesheet: &Stylesheet,
        input_size: usize,
        documents: usize,
        label: Option<&str>,
    ) -> PurgeOutput {
        let builder = ReportBuilder::new().with_documents_scanned(documents);
        let builder = match label {
            Some(label) => builder.with_stylesheet(label),
            None => builder,
        };

        let matcher = Matcher::new(tokens, &self.options.safelist);
        let reduction = reduce(stylesheet, &matcher, &self.options.reduce);
        let css = serialize(&reduction.stylesheet);

        let report = builder
            .with_rejected(reduction.rejected)
            .with_removed_at_rules(reduction.removed_at_rules)
            .build(
                input_size,
                css.len(),
                (stylesheet.rule_count(), reduction.stylesheet.rule_count()),
                reduction.selectors_kept,
            );

        tracing::debug!(
            stylesheet = label.unwrap_or("<inline>"),
            rejected = report.rejected_count(),
            bytes_before = input_size,
            bytes_after = css.len(),
            "purged stylesheet"
        );

        PurgeOutput { css, report }
    }
}

/// Purge `css` against markup strings with default options
pub fn purge_css(markup: &[&str], css: &str) -> String {
    let corpus = MarkupCorpus::from_strings(markup.iter().copied());
    Purger::default().purge(&corpus, css).css
}
