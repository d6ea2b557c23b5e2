//! On-call log snippet selection. Ported from `agent/logs_select.py`:
//! prefer real failure signals (ERROR/FATAL/PANIC, tracebacks, stack
//! continuations) over config/banner noise, and keep the most recent
//! high-signal line rather than the first one encountered.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

fn looks_like_startup_banner(line: &str) -> bool {
    let t = line.trim();
    if t.is_empty() {
        return false;
    }
    if t.contains("____") && (t.contains("|_|") || t.contains("___")) {
        return true;
    }
    if t.starts_with(" .   ____")
        || t.starts_with("\\/  ___")
        || t.starts_with(" \\\\/  ___")
        || t.starts_with(" =========")
    {
        return true;
    }
    if t.to_ascii_lowercase().contains(":: spring boot ::") {
        return true;
    }
    false
}

fn is_noise_line(line: &str) -> bool {
    let s = line.trim();
    if s.is_empty() {
        return true;
    }
    if looks_like_startup_banner(s) {
        return true;
    }
    let sl = s.to_ascii_lowercase();
    if sl.contains("missing _msg field") {
        return true;
    }
    if s.contains("docs.victoriametrics.com/victorialogs/keyconcepts/#message-field") {
        return true;
    }
    false
}

static CFG_KV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[\w.\-]+\s*=\s*.+$").unwrap());

fn looks_like_config_noise(line: &str) -> bool {
    let s = line.trim();
    if s.is_empty() {
        return false;
    }
    let sl = s.to_ascii_lowercase();
    if sl.contains("exception.handler") {
        return true;
    }
    if sl.contains("exceptionhandler") && CFG_KV_RE.is_match(s) {
        return true;
    }
    if sl.contains("exception") && CFG_KV_RE.is_match(s) {
        return true;
    }
    false
}

static AT_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+at\s+\S+").unwrap());
static MORE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\.\.\. \d+ more\s*$").unwrap());

fn is_stack_continuation(line: &str) -> bool {
    let s = line.trim_end_matches('\r');
    if s.is_empty() {
        return false;
    }
    if s.starts_with("\tat ") || AT_LINE_RE.is_match(s) {
        return true;
    }
    let sl = s.to_ascii_lowercase();
    if sl.starts_with("caused by:") || sl.starts_with("suppressed:") {
        return true;
    }
    if MORE_LINE_RE.is_match(s) {
        return true;
    }
    false
}

static FATAL_PANIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(fatal|panic)\b").unwrap());
static ERROR_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(error)\b").unwrap());
static ERROR_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*error\b").unwrap());
static EXCEPTION_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*exception(\b|:)").unwrap());
static WARN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bwarn(ing)?\b").unwrap());

/// The log-snippet scoring rubric: higher wins, ties broken by recency.
fn score_line(line: &str) -> i32 {
    let s = line.trim();
    if s.is_empty() {
        return 0;
    }
    if is_noise_line(s) {
        return 0;
    }
    if looks_like_config_noise(s) {
        return 1;
    }
    let sl = s.to_ascii_lowercase();

    if FATAL_PANIC_RE.is_match(&sl) {
        return 110;
    }
    if ERROR_WORD_RE.is_match(&sl) || ERROR_START_RE.is_match(&sl) {
        return 100;
    }
    if sl.contains("traceback") {
        return 100;
    }
    if EXCEPTION_START_RE.is_match(&sl) || sl.contains("exception:") {
        return 95;
    }
    if sl.contains("caused by:") {
        return 92;
    }
    if is_stack_continuation(s) {
        return 70;
    }
    if sl.contains("probe") && sl.contains("failed") {
        return 90;
    }
    if WARN_RE.is_match(&sl) {
        return 20;
    }
    5
}

type Entry = HashMap<String, Value>;

fn entry_timestamp(e: &Entry) -> Option<DateTime<Utc>> {
    match e.get("timestamp") {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc)),
        _ => None,
    }
}

fn flatten_entries(entries: &[Entry]) -> Vec<(Option<DateTime<Utc>>, usize, Vec<String>)> {
    let mut out = Vec::new();
    for (i, e) in entries.iter().enumerate() {
        let ts = entry_timestamp(e);
        let msg = e.get("message").and_then(Value::as_str).unwrap_or("");
        let lines: Vec<String> =
            msg.lines().map(|l| l.trim_end_matches('\r').to_string()).filter(|l| !l.trim().is_empty()).collect();
        if !lines.is_empty() {
            out.push((ts, i, lines));
        }
    }
    out
}

/// Pick the single best log line for a verdict one-liner: highest score,
/// ties broken by recency (then entry/line order).
pub fn select_best_line(entries: &[Entry]) -> Option<String> {
    let flat = flatten_entries(entries);
    let mut best: Option<(i64, usize, usize, String, i32)> = None;

    for (ts, entry_i, lines) in &flat {
        let ts_key = ts.map(|t| t.timestamp()).unwrap_or(0);
        for (line_i, ln) in lines.iter().enumerate() {
            let s = ln.trim();
            if is_noise_line(s) {
                continue;
            }
            let score = score_line(s);
            let better = match &best {
                None => true,
                Some((bts, bentry, bline, _, bscore)) => {
                    score > *bscore || (score == *bscore && (ts_key, *entry_i, line_i) > (*bts, *bentry, *bline))
                }
            };
            if better {
                best = Some((ts_key, *entry_i, line_i, s.to_string(), score));
            }
        }
    }

    best.map(|(_, _, _, line, _)| if line.chars().count() > 180 { line.chars().take(180).collect() } else { line })
}

/// Pick a small, actionable snippet: the most recent high-signal line plus
/// a few lines of surrounding context from the same log entry, extended
/// across contiguous stack frames. Falls back to a tail of non-noise lines.
pub fn select_snippet_latest_error_with_context(
    entries: &[Entry],
    max_lines: usize,
    before: usize,
    after: usize,
) -> Vec<String> {
    let flat = flatten_entries(entries);
    if flat.is_empty() {
        return Vec::new();
    }

    let mut winner: Option<(i64, usize, usize)> = None;
    for (ts, entry_i, lines) in &flat {
        let ts_key = ts.map(|t| t.timestamp()).unwrap_or(0);
        for (line_i, ln) in lines.iter().enumerate() {
            let s = ln.trim();
            if is_noise_line(s) {
                continue;
            }
            if score_line(s) >= 90 {
                let key = (ts_key, *entry_i, line_i);
                if winner.map(|w| key > w).unwrap_or(true) {
                    winner = Some(key);
                }
            }
        }
    }

    let mut chosen: Vec<(Option<DateTime<Utc>>, String)> = Vec::new();
    if let Some((_, win_entry_i, win_line_i)) = winner {
        if let Some((ts, _, lines)) = flat.iter().find(|(_, i, _)| *i == win_entry_i) {
            let lo = win_line_i.saturating_sub(before);
            let hi = (win_line_i + after + 1).min(lines.len());
            let mut window: Vec<String> = lines[lo..hi].to_vec();

            let mut j = hi;
            while j < lines.len() && window.len() < max_lines {
                if is_stack_continuation(&lines[j]) || lines[j].trim().is_empty() {
                    window.push(lines[j].clone());
                    j += 1;
                    continue;
                }
                break;
            }

            for ln in window {
                let s = ln.trim();
                if s.is_empty() || is_noise_line(s) {
                    continue;
                }
                chosen.push((*ts, s.to_string()));
            }
        }
    }

    if chosen.is_empty() {
        let mut tail: Vec<(Option<DateTime<Utc>>, String)> = Vec::new();
        for (ts, _, lines) in &flat {
            for ln in lines {
                let s = ln.trim();
                if s.is_empty() || is_noise_line(s) || looks_like_config_noise(s) {
                    continue;
                }
                tail.push((*ts, s.to_string()));
            }
        }
        if tail.is_empty() {
            return Vec::new();
        }
        let start = tail.len().saturating_sub(max_lines);
        chosen = tail[start..].to_vec();
    }

    chosen
        .into_iter()
        .take(max_lines)
        .map(|(ts, ln)| match ts {
            Some(t) => format!("{} {}", t.format("%H:%M:%SZ"), ln),
            None => ln,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> Entry {
        let mut e = HashMap::new();
        e.insert("message".to_string(), Value::String(message.to_string()));
        e
    }

    #[test]
    fn prefers_fatal_over_warn() {
        let entries = vec![entry("WARN: retrying connection"), entry("FATAL: could not bind socket")];
        assert_eq!(select_best_line(&entries).as_deref(), Some("FATAL: could not bind socket"));
    }

    #[test]
    fn ignores_spring_boot_banner() {
        let entries = vec![entry("  .   ____          _            __ _ _\n:: spring boot :: (v2.7.0)")];
        assert_eq!(select_best_line(&entries), None);
    }

    #[test]
    fn ignores_config_noise_with_exception_token() {
        let entries =
            vec![entry("default.production.exception.handler = class org.apache.kafka.streams.DefaultHandler")];
        // Only line is config noise (score=1), so it still wins among an otherwise-empty set.
        assert_eq!(
            select_best_line(&entries).as_deref(),
            Some("default.production.exception.handler = class org.apache.kafka.streams.DefaultHandler")
        );
    }
}
