use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::RuntimePaths;
use crate::search::{DEFAULT_RENDER_LIMIT, SearchQuery, SearchResult};

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Comma-separated keywords; every one must appear in a line.
    #[arg(long, default_value = "")]
    pub keywords: String,

    #[arg(long, default_value_t = DEFAULT_RENDER_LIMIT)]
    pub limit: usize,

    #[arg(long, default_value = "<<")]
    pub mark_open: String,

    #[arg(long, default_value = ">>")]
    pub mark_close: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: &SearchArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let (content, input_label) =
        super::read_input(args.input.as_deref(), runtime_paths).context("search input")?;
    let query = SearchQuery::parse(&args.keywords);
    eprintln!(
        "search: start input={} keywords={} limit={}",
        input_label,
        query.keywords().len(),
        args.limit
    );

    let result = crate::search::search(&content, &query, args.limit);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in render_text(&result, &query, &args.mark_open, &args.mark_close) {
            println!("{line}");
        }
    }

    eprintln!(
        "search: complete scanned={} matched={} shown={} truncated={}",
        result.lines_scanned,
        result.matching_lines,
        result.hits.len(),
        result.truncated
    );
    Ok(())
}

#[must_use]
pub fn render_text(
    result: &SearchResult,
    query: &SearchQuery,
    open: &str,
    close: &str,
) -> Vec<String> {
    result
        .hits
        .iter()
        .map(|hit| {
            format!(
                "{}: {}",
                hit.line_number,
                query.highlight(&hit.text, open, close)
            )
        })
        .collect()
}
