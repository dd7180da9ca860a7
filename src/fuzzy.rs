// Local MCP Gateway - Approximate Search
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// mgrep-style fuzzy line search. Similarity is the ratio 2·M/T, where M is
// the number of characters a character-level diff keeps in common and T the
// combined length of both strings.

use crate::error::{GatewayError, GatewayResult};
use crate::providers::{ApproximateSearchProvider, FuzzyMatch};
use similar::TextDiff;
use std::cmp::Ordering;
use std::path::Path;

/// Snippets longer than this are cut and suffixed with "..."
pub const SNIPPET_LIMIT: usize = 240;
const MAX_WINDOW: usize = 5;

pub struct FuzzyMatcher;

impl ApproximateSearchProvider for FuzzyMatcher {
    fn search(&self, path: &Path, query: &str, min_probability: f64, max_results: usize) -> GatewayResult<Vec<FuzzyMatch>> {
        if query.trim().is_empty() {
            return Err(GatewayError::collaborator("query must not be empty"));
        }
        if !(0.0..=1.0).contains(&min_probability) {
            return Err(GatewayError::collaborator("min_probability must be between 0.0 and 1.0"));
        }
        if max_results < 1 {
            return Err(GatewayError::collaborator("max_results must be at least 1"));
        }
        if !path.is_file() {
            return Err(GatewayError::collaborator(format!("File not found: {}", path.display())));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| GatewayError::collaborator(format!("read failed for {}: {}", path.display(), e)))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(rank_lines(&text, query, min_probability, max_results))
    }
}

/// Score every line (and a short window starting at it) against `query`.
pub fn rank_lines(text: &str, query: &str, min_probability: f64, max_results: usize) -> Vec<FuzzyMatch> {
    let lines: Vec<&str> = text.lines().collect();
    // Longer queries compare against a few joined lines as well
    let window = (query.chars().count() / 80 + 1).clamp(1, MAX_WINDOW);

    let mut results = Vec::new();
    for idx in 0..lines.len() {
        let mut best_score = 0.0;
        let mut best_text = String::new();

        let mut candidates = vec![lines[idx].to_string()];
        if window > 1 {
            let end = (idx + window).min(lines.len());
            candidates.push(lines[idx..end].join(" "));
        }

        for candidate in candidates {
            let score = similarity(query, &candidate);
            if score > best_score {
                best_score = score;
                best_text = candidate;
            }
        }

        if best_score >= min_probability {
            results.push(FuzzyMatch {
                score: best_score,
                line_no: idx + 1,
                snippet: truncate_snippet(best_text.trim()),
            });
        }
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.line_no.cmp(&b.line_no))
    });
    results.truncate(max_results);
    results
}

fn truncate_snippet(snippet: &str) -> String {
    if snippet.chars().count() > SNIPPET_LIMIT {
        let head: String = snippet.chars().take(SNIPPET_LIMIT - 3).collect();
        format!("{}...", head)
    } else {
        snippet.to_string()
    }
}

/// Similarity of two strings in [0.0, 1.0]: 2·M/T over a character diff
fn similarity(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

// ============================================================================
// TESTS
// ============================================================================
