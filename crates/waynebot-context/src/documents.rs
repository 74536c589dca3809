// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Project material injected into the system message: the project context
//! block, the project's `AGENTS.md`, and its erd/prd/decisions documents.
//!
//! Unreadable files and missing directories are skipped silently; a project
//! without documents simply contributes nothing.

use std::path::Path;

use tracing::debug;
use waynebot_core::Project;

/// `AGENTS.md` is cut to this many bytes.
pub const MAX_AGENTS_MD_CHARS: usize = 16_000;

/// Combined size of all included project documents.
pub const MAX_DOCUMENT_CHARS: usize = 32_000;

/// Only the newest entries of each decisions file are kept.
pub const MAX_DECISION_ENTRIES: usize = 20;

/// Document directories in inclusion order, with their section labels.
const CATEGORIES: [(&str, &str); 3] = [("erd", "ERD"), ("prd", "PRD"), ("decisions", "Decisions")];

/// `## Project Context` block naming the channel's first project.
pub fn project_context_block(project: &Project) -> String {
    let mut block = format!(
        "\n\n## Project Context\nThis channel is associated with the project **{}**.",
        project.name
    );
    if !project.description.is_empty() {
        block.push_str("\nDescription: ");
        block.push_str(&project.description);
    }
    block.push_str(
        "\nFile tools (file_read, file_write, shell_exec) are scoped to the project directory.",
    );
    block
}

/// The project's `AGENTS.md` wrapped in its header, or empty when absent or blank.
pub async fn read_agents_md(project_dir: &Path) -> String {
    let Ok(raw) = tokio::fs::read_to_string(project_dir.join("AGENTS.md")).await else {
        return String::new();
    };
    let content = truncate_to_boundary(&raw, MAX_AGENTS_MD_CHARS);
    if content.trim().is_empty() {
        return String::new();
    }
    format!("\n\n## Project Instructions (AGENTS.md)\n{content}")
}

/// All markdown documents of the project under the shared size budget,
/// rendered as a `## Project Documents` block. Empty when none exist.
pub async fn read_project_documents(project_dir: &Path) -> String {
    let mut included: Vec<(&str, String, String)> = Vec::new();
    let mut total = 0usize;

    'categories: for (dir_name, label) in CATEGORIES {
        let dir = project_dir.join(dir_name);
        for filename in markdown_files(&dir).await {
            let Ok(raw) = tokio::fs::read_to_string(dir.join(&filename)).await else {
                continue;
            };
            let mut content = raw.trim().to_string();
            if content.is_empty() {
                continue;
            }
            if dir_name == "decisions" {
                content = truncate_decisions(&content, MAX_DECISION_ENTRIES);
            }

            if total + content.len() > MAX_DOCUMENT_CHARS {
                let room = MAX_DOCUMENT_CHARS - total;
                if room > 0 {
                    let cut = truncate_to_boundary(&content, room).to_string();
                    included.push((label, filename, cut));
                }
                debug!(dir = %dir.display(), "project document budget reached");
                break 'categories;
            }
            total += content.len();
            included.push((label, filename, content));
        }
    }

    if included.is_empty() {
        return String::new();
    }
    let mut block = String::from("\n\n## Project Documents\n");
    for (label, filename, content) in included {
        block.push_str(&format!("\n### {label} - {filename}\n{content}\n"));
    }
    block
}

/// Keep the last `max_entries` entries of a decisions log. An entry starts at
/// a line that is `---` (ignoring surrounding whitespace) or begins with `## `.
pub fn truncate_decisions(content: &str, max_entries: usize) -> String {
    let mut entries: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.split('\n') {
        let trimmed = line.trim();
        if (trimmed == "---" || trimmed.starts_with("## ")) && !current.is_empty() {
            entries.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        entries.push(current);
    }

    if entries.len() <= max_entries {
        return content.to_string();
    }
    entries[entries.len() - max_entries..]
        .iter()
        .map(|entry| entry.join("\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sorted `.md` file names directly inside `dir`.
async fn markdown_files(dir: &Path) -> Vec<String> {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return Vec::new();
    };
    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && name.ends_with(".md") {
            names.push(name);
        }
    }
    names.sort();
    names
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char boundary.
fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn project(description: &str) -> Project {
        Project {
            id: 1,
            name: "atlas".into(),
            path: "/srv/atlas".into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn project_block_mentions_name_and_description() {
        let block = project_context_block(&project("maps"));
        assert!(block.starts_with("\n\n## Project Context\n"));
        assert!(block.contains("**atlas**"));
        assert!(block.contains("\nDescription: maps"));
        assert!(block.ends_with("scoped to the project directory."));
        assert!(!project_context_block(&project("")).contains("Description"));
    }

    #[tokio::test]
    async fn agents_md_is_capped() {
        let dir = tempdir().unwrap();
        assert_eq!(read_agents_md(dir.path()).await, "");

        std::fs::write(dir.path().join("AGENTS.md"), "x".repeat(20_000)).unwrap();
        let block = read_agents_md(dir.path()).await;
        let header = "\n\n## Project Instructions (AGENTS.md)\n";
        assert!(block.starts_with(header));
        assert_eq!(block.len(), header.len() + MAX_AGENTS_MD_CHARS);

        std::fs::write(dir.path().join("AGENTS.md"), "   \n").unwrap();
        assert_eq!(read_agents_md(dir.path()).await, "");
    }

    #[tokio::test]
    async fn documents_in_category_order() {
        let dir = tempdir().unwrap();
        for sub in ["erd", "prd", "decisions"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        std::fs::write(dir.path().join("prd/b.md"), "product").unwrap();
        std::fs::write(dir.path().join("prd/a.md"), "first").unwrap();
        std::fs::write(dir.path().join("erd/schema.md"), "tables").unwrap();
        std::fs::write(dir.path().join("erd/notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("decisions/log.md"), "## one\nuse sqlite").unwrap();

        let block = read_project_documents(dir.path()).await;
        assert_eq!(
            block,
            "\n\n## Project Documents\n\
             \n### ERD - schema.md\ntables\n\
             \n### PRD - a.md\nfirst\n\
             \n### PRD - b.md\nproduct\n\
             \n### Decisions - log.md\n## one\nuse sqlite\n"
        );
    }

    #[tokio::test]
    async fn document_budget_truncates_last_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("erd")).unwrap();
        std::fs::create_dir(dir.path().join("prd")).unwrap();
        std::fs::write(dir.path().join("erd/a.md"), "a".repeat(30_000)).unwrap();
        std::fs::write(dir.path().join("erd/b.md"), "b".repeat(5_000)).unwrap();
        std::fs::write(dir.path().join("prd/c.md"), "never").unwrap();

        let block = read_project_documents(dir.path()).await;
        assert!(block.contains(&format!("### ERD - b.md\n{}\n", "b".repeat(2_000))));
        assert!(!block.contains("PRD"));
    }

    #[tokio::test]
    async fn missing_project_dir_yields_nothing() {
        assert_eq!(read_project_documents(Path::new("/nonexistent/waynebot")).await, "");
    }

    #[test]
    fn decisions_keep_newest_entries() {
        let log: String = (1..=25)
            .map(|i| format!("## Decision {i}\nbody {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let kept = truncate_decisions(&log, 20);
        assert!(kept.starts_with("## Decision 6\nbody 6"));
        assert!(kept.ends_with("## Decision 25\nbody 25"));
        assert!(!kept.contains("Decision 5\n"));

        let short = "---\nonly\n---\ntwo";
        assert_eq!(truncate_decisions(short, 20), short);
    }

    #[test]
    fn decisions_preamble_counts_as_entry() {
        let log = "# Decisions\n---\nA\n---\nB";
        assert_eq!(truncate_decisions(log, 2), "---\nA\n---\nB");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_boundary("héllo", 2), "h");
        assert_eq!(truncate_to_boundary("abc", 10), "abc");
    }

    proptest::proptest! {
        #[test]
        fn truncation_is_a_bounded_prefix(s in "\\PC{0,64}", max in 0usize..80) {
            let cut = truncate_to_boundary(&s, max);
            proptest::prop_assert!(cut.len() <= max);
            proptest::prop_assert!(s.starts_with(cut));
        }

        #[test]
        fn decisions_never_grow(entries in 0usize..40, keep in 1usize..25) {
            let log: String = (0..entries)
                .map(|i| format!("## {i}\nline"))
                .collect::<Vec<_>>()
                .join("\n");
            let kept = truncate_decisions(&log, keep);
            proptest::prop_assert!(kept.len() <= log.len());
            proptest::prop_assert!(log.ends_with(&kept));
        }
    }
}
