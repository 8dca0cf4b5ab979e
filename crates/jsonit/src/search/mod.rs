use regex::{Regex, RegexBuilder};
use serde::Serialize;

pub const DEFAULT_RENDER_LIMIT: usize = 500;

/// Comma-separated keywords; a line matches only when it holds all of them.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl SearchQuery {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let keywords: Vec<String> = raw
            .split(',')
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        let patterns = keywords.iter().filter_map(|keyword| literal_pattern(keyword)).collect();

        Self { keywords, patterns }
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        self.keywords.iter().all(|keyword| lowered.contains(keyword.as_str()))
    }

    /// Wraps every keyword occurrence in `open`/`close`. Overlapping hits of
    /// different keywords are merged into one marked span.
    #[must_use]
    pub fn highlight(&self, line: &str, open: &str, close: &str) -> String {
        let mut spans: Vec<(usize, usize)> = self
            .patterns
            .iter()
            .flat_map(|pattern| pattern.find_iter(line).map(|hit| (hit.start(), hit.end())))
            .collect();
        if spans.is_empty() {
            return line.to_string();
        }
        spans.sort_unstable();

        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        let mut out = String::with_capacity(line.len() + merged.len() * (open.len() + close.len()));
        let mut cursor = 0;
        for (start, end) in merged {
            out.push_str(&line[cursor..start]);
            out.push_str(open);
            out.push_str(&line[start..end]);
            out.push_str(close);
            cursor = end;
        }
        out.push_str(&line[cursor..]);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// 1-based position in the input, blank lines included.
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub keywords: Vec<String>,
    pub lines_scanned: usize,
    pub matching_lines: usize,
    pub limit: usize,
    pub truncated: bool,
    pub hits: Vec<SearchHit>,
}

#[must_use]
pub fn search(content: &str, query: &SearchQuery, limit: usize) -> SearchResult {
    let mut lines_scanned = 0;
    let mut matching_lines = 0;
    let mut hits = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        lines_scanned += 1;
        if !query.matches(line) {
            continue;
        }
        matching_lines += 1;
        if hits.len() < limit {
            hits.push(SearchHit {
                line_number: index + 1,
                text: line.to_string(),
            });
        }
    }

    SearchResult {
        keywords: query.keywords().to_vec(),
        lines_scanned,
        matching_lines,
        limit,
        truncated: matching_lines > hits.len(),
        hits,
    }
}

fn literal_pattern(keyword: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .ok()
}
