//! Extracts `Day N:` / `Week N:` segments from generated text.
//!
//! The primary pass takes everything between one period label and the next. If
//! that leaves the first period empty, a line-oriented scan accepts looser
//! labels (`Day 1 -`, `### Week 2`, `Day1)`) and appends continuation lines to
//! the current period. A first period that is still empty means the text could
//! not be parsed.

use lazy_static::lazy_static;
use regex::Regex;
use shared::PlanMode;

lazy_static! {
    static ref DAY_LABEL: Regex = Regex::new(r"(?i)\bday\s+(\d+)\s*:").unwrap();
    static ref WEEK_LABEL: Regex = Regex::new(r"(?i)\bweek\s+(\d+)\s*:").unwrap();
    static ref DAY_LINE: Regex =
        Regex::new(r"(?i)^[\s*#>•-]*day\s*(\d+)\b[\s*]*[:.)\-–]*[\s*]*(.*)$").unwrap();
    static ref WEEK_LINE: Regex =
        Regex::new(r"(?i)^[\s*#>•-]*week\s*(\d+)\b[\s*]*[:.)\-–]*[\s*]*(.*)$").unwrap();
}

fn label_pattern(mode: PlanMode) -> &'static Regex {
    match mode {
        PlanMode::Daily => &DAY_LABEL,
        PlanMode::Weekly => &WEEK_LABEL,
    }
}

fn line_pattern(mode: PlanMode) -> &'static Regex {
    match mode {
        PlanMode::Daily => &DAY_LINE,
        PlanMode::Weekly => &WEEK_LINE,
    }
}

/// Trims whitespace and markdown emphasis left around a segment.
fn clean_segment(segment: &str) -> String {
    segment
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}

fn period_index(raw: &str, mode: PlanMode) -> Option<usize> {
    let n: usize = raw.parse().ok()?;
    (1..=mode.period_count()).contains(&n).then(|| n - 1)
}

fn scan_labels(text: &str, mode: PlanMode) -> Vec<String> {
    let mut periods = vec![String::new(); mode.period_count()];
    let marks: Vec<(usize, usize, Option<usize>)> = label_pattern(mode)
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), period_index(&caps[1], mode)))
        })
        .collect();

    for (i, (_, content_start, index)) in marks.iter().enumerate() {
        let content_end = marks.get(i + 1).map(|next| next.0).unwrap_or(text.len());
        if let Some(index) = index {
            periods[*index] = clean_segment(&text[*content_start..content_end]);
        }
    }
    periods
}

fn scan_lines(text: &str, mode: PlanMode) -> Vec<String> {
    let mut periods = vec![String::new(); mode.period_count()];
    let mut current: Option<usize> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(caps) = line_pattern(mode).captures(trimmed) {
            current = period_index(&caps[1], mode);
            if let Some(index) = current {
                periods[index] = clean_segment(&caps[2]);
            }
        } else if let Some(index) = current {
            if trimmed.is_empty() {
                continue;
            }
            let period = &mut periods[index];
            if !period.is_empty() {
                period.push(' ');
            }
            period.push_str(trimmed);
        }
    }
    periods
}

/// Returns one entry per period (index 0 is period 1), or `None` when the first
/// period could not be found. Later periods may be empty.
pub fn parse_plan(text: &str, mode: PlanMode) -> Option<Vec<String>> {
    let periods = scan_labels(text, mode);
    if !periods[0].is_empty() {
        return Some(periods);
    }
    let periods = scan_lines(text, mode);
    if periods[0].is_empty() { None } else { Some(periods) }
}
