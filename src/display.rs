//! Text for version list entries.

use chrono::Local;
use std::path::Path;

use crate::constant::{DISK_STATE_LABEL, SHORT_HASH_LEN};
use crate::version::{CommitInfo, VersionDescriptor};

/// How one version appears in a list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryText {
    pub title: String,
    pub details: Vec<String>,
    pub tooltip: Option<String>,
}

/// Size in kilobytes with one decimal, "0" for empty files
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        "0".to_string()
    } else {
        format!("{:.1}", bytes as f64 / 1000.0)
    }
}

pub fn short_hash(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}

/// Describe `descriptor` for a list belonging to the file at `current_path`
pub fn entry_text(descriptor: &VersionDescriptor, current_path: &Path) -> EntryText {
    let local = descriptor.timestamp.with_timezone(&Local);

    if descriptor.is_disk_state {
        return EntryText {
            title: DISK_STATE_LABEL.to_string(),
            details: vec![local.format("%H:%M:%S").to_string()],
            tooltip: None,
        };
    }

    if let Some(commit) = &descriptor.commit {
        return commit_text(commit, current_path);
    }

    let title = local.format("%a %b %d %Y, %H:%M:%S").to_string();
    let details = match (&descriptor.device, descriptor.size_bytes) {
        (Some(device), Some(size)) => vec![format!("{} KB [{}]", format_size(size), device)],
        (Some(device), None) => vec![format!("[{device}]")],
        (None, _) => Vec::new(),
    };

    EntryText {
        title,
        details,
        tooltip: None,
    }
}

fn commit_text(commit: &CommitInfo, current_path: &Path) -> EntryText {
    let mut details = Vec::new();

    if !commit.file_name.is_empty() && Path::new(&commit.file_name) != current_path {
        let old_name = Path::new(&commit.file_name)
            .with_extension("")
            .to_string_lossy()
            .into_owned();
        details.push(format!("Old name: {old_name}"));
    }

    let (date, time) = commit.date.split_once('T').unwrap_or((commit.date.as_str(), ""));
    details.push(date.to_string());
    if !time.is_empty() {
        details.push(time.to_string());
    }
    details.push(commit.author_name.clone());
    details.push(short_hash(&commit.hash).to_string());
    if !commit.refs.is_empty() {
        details.push(commit.refs.clone());
    }

    EntryText {
        title: commit.message.clone(),
        details,
        tooltip: (!commit.body.is_empty()).then(|| commit.body.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionId;
    use chrono::Utc;

    fn commit(file_name: &str) -> VersionDescriptor {
        VersionDescriptor {
            id: VersionId::Commit("0123456789abcdef".to_string()),
            timestamp: Utc::now(),
            size_bytes: None,
            label: "Fix typo".to_string(),
            is_disk_state: false,
            device: None,
            commit: Some(CommitInfo {
                hash: "0123456789abcdef".to_string(),
                author_name: "Ada".to_string(),
                author_email: "ada@example.com".to_string(),
                date: "2024-05-02T10:00:00+02:00".to_string(),
                refs: "HEAD -> main".to_string(),
                message: "Fix typo".to_string(),
                body: "Longer explanation".to_string(),
                file_name: file_name.to_string(),
            }),
        }
    }

    #[test]
    fn sizes_are_in_kilobytes() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(1234), "1.2");
        assert_eq!(format_size(60), "0.1");
    }

    #[test]
    fn short_hash_handles_short_input() {
        assert_eq!(short_hash("0123456789"), "0123456");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn commit_entry_shows_metadata() {
        let text = entry_text(&commit("notes.md"), Path::new("notes.md"));
        assert_eq!(text.title, "Fix typo");
        assert_eq!(
            text.details,
            vec!["2024-05-02", "10:00:00+02:00", "Ada", "0123456", "HEAD -> main"]
        );
        assert_eq!(text.tooltip.as_deref(), Some("Longer explanation"));
    }

    #[test]
    fn renamed_commit_shows_old_name() {
        let text = entry_text(&commit("drafts/idea.md"), Path::new("notes.md"));
        assert_eq!(text.details[0], "Old name: drafts/idea");
    }

    #[test]
    fn disk_state_and_sync_entries() {
        let disk = VersionDescriptor::disk_state(Utc::now());
        assert_eq!(entry_text(&disk, Path::new("a.md")).title, DISK_STATE_LABEL);

        let sync = VersionDescriptor {
            id: VersionId::Sync(7),
            timestamp: Utc::now(),
            size_bytes: Some(2048),
            label: "phone".to_string(),
            is_disk_state: false,
            device: Some("phone".to_string()),
            commit: None,
        };
        assert_eq!(
            entry_text(&sync, Path::new("a.md")).details,
            vec!["2.0 KB [phone]"]
        );
    }
}
