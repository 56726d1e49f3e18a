use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;

/// One repository to synchronize, read from a build report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTask {
    /// Repository name; also the name of its working copy directory.
    pub name: String,
    pub remote_url: String,
    /// Commit (hash or ref) that must end up on the stable branch.
    pub target_commit: String,
}

impl RepositoryTask {
    pub fn new(name: &str, remote_url: &str, target_commit: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_url: remote_url.to_string(),
            target_commit: target_commit.to_string(),
        }
    }
}

/// Load a build report from disk.
pub async fn load(path: &Path) -> Result<Vec<RepositoryTask>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read build report {}", path.display()))?;
    parse(&text).with_context(|| format!("Invalid build report {}", path.display()))
}

/// Parse a comma-delimited build report.
///
/// The first row is a header and is discarded. Every other non-blank row must
/// hold exactly `name, remote URL, target commit`. Fields may be wrapped in
/// double quotes, in which case they can contain commas and `""` stands for a
/// literal quote.
pub fn parse(text: &str) -> Result<Vec<RepositoryTask>> {
    let mut tasks = Vec::new();
    let mut seen = HashSet::new();

    for (index, row) in text.lines().enumerate().skip(1) {
        let line_number = index + 1;
        if row.trim().is_empty() {
            continue;
        }

        let fields = split_fields(line_number, row)?;
        let [name, remote_url, target_commit] = fields.as_slice() else {
            bail!(
                "line {line_number}: expected 3 fields (name, url, commit), got {}",
                fields.len()
            );
        };

        if name.is_empty() || remote_url.is_empty() || target_commit.is_empty() {
            bail!("line {line_number}: empty field in {row:?}");
        }
        // Every field ends up as a git argument
        if let Some(field) = fields.iter().find(|field| field.starts_with('-')) {
            bail!("line {line_number}: field {field:?} must not start with '-'");
        }
        // The name becomes a directory under the workspace
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("line {line_number}: repository name {name:?} is not a plain directory name");
        }
        if !seen.insert(name.clone()) {
            bail!("line {line_number}: duplicate repository {name:?}");
        }

        tasks.push(RepositoryTask::new(name, remote_url, target_commit));
    }

    Ok(tasks)
}

/// Split one row into trimmed fields, honoring double-quoted fields.
fn split_fields(line_number: usize, row: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = row.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut field = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') if chars.next_if_eq(&'"').is_some() => field.push('"'),
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => bail!("line {line_number}: unterminated quoted field in {row:?}"),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_some_and(|c| *c != ',') {
                bail!("line {line_number}: unexpected text after quoted field in {row:?}");
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                field.push(c);
            }
            field.truncate(field.trim_end().len());
        }
        fields.push(field);

        if chars.next().is_none() {
            return Ok(fields);
        }
    }
}
