//! Diff output handed to renderers.
//!
//! `unified` produces a two-file patch for the current pair; the line and row
//! helpers give renderers a structured view with character-level stats.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write;

use crate::config::DiffStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLineType {
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffRow {
    Unchanged(String),
    Pair(Vec<DiffLine>, Vec<DiffLine>),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub added_count: usize,
    pub removed_count: usize,
}

/// Unified patch from `left` to `right`, both headers named `name`.
///
/// Identical inputs produce an empty string.
pub fn unified(name: &str, left: &str, right: &str, context_lines: usize) -> String {
    TextDiff::from_lines(left, right)
        .unified_diff()
        .context_radius(context_lines)
        .header(name, name)
        .to_string()
}

/// Compute line-based diff between old and new text
pub fn compute_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let diff = TextDiff::from_lines(old, new);
    let mut diff_lines = Vec::new();

    for change in diff.iter_all_changes() {
        let line_type = match change.tag() {
            ChangeTag::Delete => DiffLineType::Removed,
            ChangeTag::Insert => DiffLineType::Added,
            ChangeTag::Equal => DiffLineType::Unchanged,
        };

        diff_lines.push(DiffLine {
            line_type,
            content: change.to_string().trim_end().to_string(),
        });
    }

    diff_lines
}

/// Group raw diff lines into rows where unchanged identical lines are single rows,
/// and contiguous removed/added blocks become paired rows.
pub fn group_into_rows(diff_lines: &[DiffLine]) -> Vec<DiffRow> {
    let mut rows = Vec::new();
    let mut i = 0usize;

    while i < diff_lines.len() {
        match &diff_lines[i].line_type {
            DiffLineType::Unchanged => {
                rows.push(DiffRow::Unchanged(diff_lines[i].content.clone()));
                i += 1;
            }
            DiffLineType::Removed => {
                let mut removed_block = vec![diff_lines[i].clone()];
                i += 1;
                while i < diff_lines.len() && diff_lines[i].line_type == DiffLineType::Removed {
                    removed_block.push(diff_lines[i].clone());
                    i += 1;
                }

                let mut added_block = Vec::new();
                while i < diff_lines.len() && diff_lines[i].line_type == DiffLineType::Added {
                    added_block.push(diff_lines[i].clone());
                    i += 1;
                }

                rows.push(DiffRow::Pair(removed_block, added_block));
            }
            DiffLineType::Added => {
                // added without preceding removal -> right-only
                rows.push(DiffRow::Pair(Vec::new(), vec![diff_lines[i].clone()]));
                i += 1;
            }
        }
    }

    rows
}

/// Check if diff lines contain meaningful changes (non-empty added or removed content)
pub fn has_meaningful_changes(diff_lines: &[DiffLine]) -> bool {
    diff_lines.iter().any(|line| {
        matches!(line.line_type, DiffLineType::Added | DiffLineType::Removed)
            && !line.content.trim().is_empty()
    })
}

/// Calculate character-level statistics from diff rows
pub fn calculate_stats(rows: &[DiffRow]) -> DiffStats {
    let mut stats = DiffStats::default();

    for row in rows {
        if let DiffRow::Pair(left, right) = row {
            let left_str: String = left.iter().map(|l| l.content.as_str()).collect();
            let right_str: String = right.iter().map(|r| r.content.as_str()).collect();

            let diff = TextDiff::from_chars(&left_str, &right_str);
            for change in diff.iter_all_changes() {
                match change.tag() {
                    ChangeTag::Insert => stats.added_count += change.value().chars().count(),
                    ChangeTag::Delete => stats.removed_count += change.value().chars().count(),
                    ChangeTag::Equal => {}
                }
            }
        }
    }

    stats
}

/// Intra-line changes between a removed and an added line.
///
/// Returns `None` when the style is line-level or the lines are less similar
/// than `threshold`, in which case renderers highlight whole lines.
pub fn word_changes(
    old: &str,
    new: &str,
    style: DiffStyle,
    threshold: f32,
) -> Option<Vec<(ChangeTag, String)>> {
    if style == DiffStyle::Line {
        return None;
    }

    let diff = TextDiff::from_words(old, new);
    if diff.ratio() < threshold {
        return None;
    }

    Some(
        diff.iter_all_changes()
            .map(|change| (change.tag(), change.value().to_string()))
            .collect(),
    )
}

/// Two columns, `left` against `right`, each left cell cut to `width` chars.
///
/// The gutter shows `|` for changed rows and `<`/`>` for rows present on one
/// side only. Changed lines similar enough to pair word by word mark removed
/// words `[-like this-]` and inserted ones `{+like this+}`.
pub fn side_by_side(
    left: &str,
    right: &str,
    style: DiffStyle,
    threshold: f32,
    width: usize,
) -> String {
    let mut out = String::new();

    for row in group_into_rows(&compute_diff(left, right)) {
        match row {
            DiffRow::Unchanged(line) => push_row(&mut out, ' ', &line, &line, width),
            DiffRow::Pair(removed, added) => {
                for i in 0..removed.len().max(added.len()) {
                    match (removed.get(i), added.get(i)) {
                        (Some(old), Some(new)) => {
                            let (old, new) = mark_words(&old.content, &new.content, style, threshold);
                            push_row(&mut out, '|', &old, &new, width);
                        }
                        (Some(old), None) => push_row(&mut out, '<', &old.content, "", width),
                        (None, Some(new)) => push_row(&mut out, '>', "", &new.content, width),
                        (None, None) => {}
                    }
                }
            }
        }
    }

    out
}

fn mark_words(old: &str, new: &str, style: DiffStyle, threshold: f32) -> (String, String) {
    let Some(changes) = word_changes(old, new, style, threshold) else {
        return (old.to_string(), new.to_string());
    };

    let mut left = String::new();
    let mut right = String::new();
    for (tag, value) in changes {
        match tag {
            ChangeTag::Equal => {
                left.push_str(&value);
                right.push_str(&value);
            }
            ChangeTag::Delete => {
                let _ = write!(left, "[-{value}-]");
            }
            ChangeTag::Insert => {
                let _ = write!(right, "{{+{value}+}}");
            }
        }
    }
    (left, right)
}

fn push_row(out: &mut String, gutter: char, left: &str, right: &str, width: usize) {
    let left: String = left.chars().take(width).collect();
    let line = format!("{left:<width$} {gutter} {right}");
    out.push_str(line.trim_end());
    out.push('\n');
}
