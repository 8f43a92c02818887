use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

use super::{FileReader, SourceError, VersionPage};
use crate::version::{CommitInfo, VersionDescriptor, VersionId};

const RECORD_SEP: char = '\x1e';
const FIELD_SEP: char = '\x1f';
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ae%x1f%aI%x1f%D%x1f%s%x1f%b%x1f";

/// Read access to the version-control log of a file
pub trait GitBackend: Send + Sync {
    fn is_installed(&self) -> bool;

    /// Commits touching `path`, newest first, following renames
    fn log(&self, path: &Path) -> Result<Vec<CommitInfo>, SourceError>;

    /// Content of `path` as of `hash`
    fn show(&self, hash: &str, path: &str) -> Result<String, SourceError>;
}

/// [`GitBackend`] backed by the `git` executable
pub struct GitCli {
    repo: PathBuf,
    binary: String,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            binary: binary.into(),
        }
    }

    /// Root of the work tree containing `repo`
    pub fn toplevel(&self) -> Result<PathBuf, SourceError> {
        let output = self.run(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(output.trim()))
    }

    fn run(&self, args: &[&str]) -> Result<String, SourceError> {
        let output = Command::new(&self.binary)
            .current_dir(&self.repo)
            .args(args)
            .output()
            .map_err(|e| SourceError::FetchFailed(format!("Failed to start git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::FetchFailed(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitBackend for GitCli {
    fn is_installed(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn log(&self, path: &Path) -> Result<Vec<CommitInfo>, SourceError> {
        let path = path.to_string_lossy();
        let output = self.run(&["log", "--follow", "--name-only", LOG_FORMAT, "--", &path])?;
        let commits = parse_log(&output);
        debug!(path = %path, commits = commits.len(), "git log");
        Ok(commits)
    }

    fn show(&self, hash: &str, path: &str) -> Result<String, SourceError> {
        self.run(&["show", &format!("{hash}:{path}")])
    }
}

/// Parse `git log --name-only` output produced with [`LOG_FORMAT`]
pub fn parse_log(output: &str) -> Vec<CommitInfo> {
    output
        .split(RECORD_SEP)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let fields: Vec<&str> = record.splitn(8, FIELD_SEP).collect();
            if fields.len() < 8 {
                return None;
            }
            // name-only output trails the formatted fields
            let file_name = fields[7]
                .lines()
                .map(str::trim)
                .rfind(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string();
            Some(CommitInfo {
                hash: fields[0].trim().to_string(),
                author_name: fields[1].to_string(),
                author_email: fields[2].to_string(),
                date: fields[3].to_string(),
                refs: fields[4].to_string(),
                message: fields[5].to_string(),
                body: fields[6].trim().to_string(),
                file_name,
            })
        })
        .collect()
}

pub struct GitSource {
    git: Arc<dyn GitBackend>,
    reader: Arc<dyn FileReader>,
    path: PathBuf,
}

impl GitSource {
    pub fn new(git: Arc<dyn GitBackend>, reader: Arc<dyn FileReader>, path: PathBuf) -> Self {
        Self { git, reader, path }
    }

    /// Disk state first, then the file's commits, newest first
    pub fn list_versions(&self) -> Result<VersionPage, SourceError> {
        let commits = self.git.log(&self.path)?;
        let mut descriptors = Vec::with_capacity(commits.len() + 1);

        let mut disk = VersionDescriptor::disk_state(Utc::now());
        disk.commit = Some(CommitInfo {
            file_name: self.path.to_string_lossy().into_owned(),
            ..CommitInfo::default()
        });
        descriptors.push(disk);
        descriptors.extend(commits.into_iter().map(describe));

        Ok(VersionPage {
            descriptors,
            more: false,
        })
    }

    pub fn fetch_content(&self, descriptor: &VersionDescriptor) -> Result<String, SourceError> {
        match &descriptor.id {
            VersionId::Disk => Ok(self.reader.read(&self.path)?),
            VersionId::Commit(hash) => {
                let path = descriptor
                    .commit
                    .as_ref()
                    .map(|c| c.file_name.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| self.path.to_string_lossy().into_owned());
                self.git.show(hash, &path)
            }
            other => Err(SourceError::FetchFailed(format!(
                "{other:?} is not a commit"
            ))),
        }
    }
}

fn describe(commit: CommitInfo) -> VersionDescriptor {
    let timestamp = DateTime::parse_from_rfc3339(&commit.date)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default();
    VersionDescriptor {
        id: VersionId::Commit(commit.hash.clone()),
        timestamp,
        size_bytes: None,
        label: commit.message.clone(),
        is_disk_state: false,
        device: None,
        commit: Some(commit),
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{FakeGit, FakeReader};
    use super::*;

    fn source(git: FakeGit) -> (GitSource, Arc<FakeGit>) {
        let git = Arc::new(git);
        let backend: Arc<dyn GitBackend> = git.clone();
        (
            GitSource::new(
                backend,
                Arc::new(FakeReader::new("disk\n")),
                PathBuf::from("notes.md"),
            ),
            git,
        )
    }

    #[test]
    fn parses_log_records_with_renames() {
        let output = "\u{1e}aaa111\u{1f}Ada\u{1f}ada@example.com\u{1f}2024-05-02T10:00:00+02:00\u{1f}HEAD -> main\u{1f}Rename notes\u{1f}Longer\nbody\n\u{1f}\n\nnotes.md\n\
                      \u{1e}bbb222\u{1f}Bob\u{1f}bob@example.com\u{1f}2024-05-01T09:00:00+00:00\u{1f}\u{1f}Initial\u{1f}\u{1f}\n\ndraft.md\n";
        let commits = parse_log(output);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "aaa111");
        assert_eq!(commits[0].refs, "HEAD -> main");
        assert_eq!(commits[0].body, "Longer\nbody");
        assert_eq!(commits[0].file_name, "notes.md");
        assert_eq!(commits[1].author_name, "Bob");
        assert_eq!(commits[1].message, "Initial");
        assert_eq!(commits[1].file_name, "draft.md");
    }

    #[test]
    fn malformed_records_are_skipped() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("\u{1e}just-a-hash\n").is_empty());
    }

    #[test]
    fn timeline_has_disk_state_then_commits() {
        let (source, _) = source(FakeGit::with_commits(&["c1", "c2", "c3"]));
        let page = source.list_versions().unwrap();
        let ids: Vec<VersionId> = page.descriptors.iter().map(|d| d.id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                VersionId::Disk,
                VersionId::Commit("c1".into()),
                VersionId::Commit("c2".into()),
                VersionId::Commit("c3".into()),
            ]
        );
        assert_eq!(page.descriptors[1].label, "commit c1");
        assert!(page.descriptors[1].timestamp > page.descriptors[2].timestamp);
    }

    #[test]
    fn commit_content_uses_historical_file_name() {
        let mut git = FakeGit::with_commits(&["c1", "c2"]);
        git.commits[1].file_name = "draft.md".to_string();
        let (source, git) = source(git);
        let page = source.list_versions().unwrap();

        assert_eq!(source.fetch_content(&page.descriptors[0]).unwrap(), "disk\n");
        assert_eq!(source.fetch_content(&page.descriptors[2]).unwrap(), "content at c2\n");
        assert_eq!(
            *git.show_calls.lock().unwrap(),
            vec![("c2".to_string(), "draft.md".to_string())]
        );
    }
}
