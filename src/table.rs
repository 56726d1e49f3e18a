use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use crate::outcome::OutcomeLine;
use crate::outcome::RepositoryOutcomes;

const REPO_LABEL: &str = "repo";
const OUTCOME_LABEL: &str = "outcome";

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

/// Width of `text` as printed, ignoring ANSI escape sequences.
pub fn visible_width(text: &str) -> usize {
    MARKUP_RE.replace_all(text, "").chars().count()
}

/// Column widths of the rendered table: (repository column, outcome column).
pub fn column_widths(entries: &[RepositoryOutcomes]) -> (usize, usize) {
    let repo_width = entries
        .iter()
        .map(|entry| entry.repository.chars().count())
        .fold(REPO_LABEL.len(), usize::max);
    let outcome_width = entries
        .iter()
        .flat_map(|entry| &entry.lines)
        .map(|line| visible_width(&line.message))
        .fold(OUTCOME_LABEL.len(), usize::max);
    (repo_width, outcome_width)
}

/// Render recorded outcomes as a boxed table.
///
/// Repositories without lines are left out; when none remain, nothing is
/// rendered. Errors are shown in red.
pub fn render(entries: &[RepositoryOutcomes]) -> String {
    let entries: Vec<RepositoryOutcomes> = entries
        .iter()
        .filter(|entry| !entry.lines.is_empty())
        .cloned()
        .collect();
    if entries.is_empty() {
        return String::new();
    }

    let (rw, ow) = column_widths(&entries);
    let rule = |left: &str, mid: &str, right: &str| {
        format!("{left}═{}═{mid}═{}═{right}\n", "═".repeat(rw), "═".repeat(ow))
    };

    let mut out = rule("╔", "╦", "╗");
    out.push_str(&format!("║ {REPO_LABEL:<rw$} ║ {OUTCOME_LABEL:^ow$} ║\n"));
    out.push_str(&rule("╠", "╬", "╣"));

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(&rule("╠", "╬", "╣"));
        }
        for (j, line) in entry.lines.iter().enumerate() {
            let name = if j == 0 { entry.repository.as_str() } else { "" };
            let padding = " ".repeat(ow - visible_width(&line.message));
            out.push_str(&format!(
                "║ {name:<rw$} ║ {}{padding} ║\n",
                styled(line)
            ));
        }
    }

    out.push_str(&rule("╚", "╩", "╝"));
    out
}

fn styled(line: &OutcomeLine) -> String {
    if line.is_error {
        line.message.red().to_string()
    } else {
        line.message.clone()
    }
}
