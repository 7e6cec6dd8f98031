//! Scrollback compression heuristics.
//!
//! Raw scrollback is dominated by progress bars and repeated prompts that
//! would crowd useful context out of a fixed line budget. The passes here are
//! pure, deterministic and order-preserving: collapse progress runs, truncate
//! very large contiguous blocks, deduplicate blank lines.

use regex::RegexSet;
use std::sync::OnceLock;

const PROGRESS_RUN_KEEP: usize = 2;
const BLOCK_LIMIT: usize = 80;
const BLOCK_HEAD: usize = 20;
const BLOCK_TAIL: usize = 20;

fn progress_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"\[#+",                   // [#### style bars
            r"\d+%\s*\|[=▮█]",         // 50% |=== or 50% |▮▮▮
            r"\d+%\s*━",               // rich-style progress
            r"Downloading.*\d+%",
            r"Uploading.*\d+%",
            r"\d+%\s*\(\d+/\d+\)",     // 50% (5/10)
        ])
        .expect("progress patterns are valid")
    })
}

pub fn is_progress_line(line: &str) -> bool {
    progress_patterns().is_match(line)
}

/// Apply all compression passes in order.
pub fn compress(lines: Vec<String>) -> Vec<String> {
    dedup_blank_runs(truncate_large_blocks(collapse_progress_runs(lines)))
}

/// Collapse runs of more than two progress-style lines into
/// first + elision marker + last.
fn collapse_progress_runs(lines: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if !is_progress_line(&lines[i]) {
            result.push(lines[i].clone());
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < lines.len() && is_progress_line(&lines[j]) {
            j += 1;
        }
        let count = j - i;
        if count > PROGRESS_RUN_KEEP {
            result.push(lines[i].clone());
            result.push(format!("... ({} lines of progress output) ...", count - 2));
            result.push(lines[j - 1].clone());
        } else {
            result.extend_from_slice(&lines[i..j]);
        }
        i = j;
    }
    result
}

/// Keep head and tail of contiguous non-blank blocks longer than BLOCK_LIMIT.
fn truncate_large_blocks(lines: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if lines[i].is_empty() {
            result.push(lines[i].clone());
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && !lines[i].is_empty() {
            i += 1;
        }
        let block = &lines[start..i];
        if block.len() > BLOCK_LIMIT {
            result.extend_from_slice(&block[..BLOCK_HEAD]);
            result.push(format!(
                "... ({} lines truncated) ...",
                block.len() - BLOCK_HEAD - BLOCK_TAIL
            ));
            result.extend_from_slice(&block[block.len() - BLOCK_TAIL..]);
        } else {
            result.extend_from_slice(block);
        }
    }
    result
}

/// Squash consecutive blank lines down to one.
fn dedup_blank_runs(lines: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(lines.len());
    let mut prev_blank = false;
    for line in lines {
        if line.is_empty() {
            if !prev_blank {
                result.push(line);
            }
            prev_blank = true;
        } else {
            prev_blank = false;
            result.push(line);
        }
    }
    result
}
