//! Versioned file-system abstraction backed by a git repository.
//!
//! Git is driven by shelling out via `tokio::process::Command` rather
//! than `git2`; every public method opens with a `debug!(...): called`
//! entry log.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::WorkspaceError;

const META_DIR: &str = ".swarm";

/// Ahead-count plus last commit summary for one branch.
#[derive(Debug, Clone)]
pub struct BranchStatus {
    pub ahead: u32,
    pub last_commit_summary: String,
}

/// One hit from `search_code`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub file: String,
    pub line: u32,
    pub content: String,
}

/// A versioned workspace rooted at a git repository.
pub struct Workspace {
    root: PathBuf,
    branch_prefix: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, branch_prefix: impl Into<String>) -> Self {
        Self { root: root.into(), branch_prefix: branch_prefix.into() }
    }

    pub fn meta_root(&self) -> PathBuf {
        self.root.join(META_DIR)
    }

    /// The filesystem root this workspace is checked out at, for tools
    /// that need to spawn a process with the workspace as its cwd.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    async fn git<I, S>(&self, args: I) -> Result<std::process::Output, WorkspaceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| WorkspaceError::GitFailed(e.to_string()))
    }

    /// Create or open a repository at the workspace path, ensure a
    /// primary branch exists, create the metadata subtree, and on first
    /// init produce two seed commits (initial + metadata).
    pub async fn init(&self) -> Result<(), WorkspaceError> {
        debug!(root = ?self.root, "Workspace::init: called");
        tokio::fs::create_dir_all(&self.root).await?;

        let is_repo = self.root.join(".git").exists();
        if !is_repo {
            self.git(["init"]).await?;
            self.git(["config", "user.email", "swarm@taskswarm.local"]).await?;
            self.git(["config", "user.name", "taskswarm"]).await?;
            self.git(["commit", "--allow-empty", "-m", "initial"]).await?;
            debug!("Workspace::init: created new repository with initial commit");
        }

        let tasks_dir = self.meta_root().join("tasks");
        let messages_dir = self.meta_root().join("messages");
        tokio::fs::create_dir_all(&tasks_dir).await?;
        tokio::fs::create_dir_all(&messages_dir).await?;
        tokio::fs::write(tasks_dir.join(".gitkeep"), b"").await?;
        tokio::fs::write(messages_dir.join(".gitkeep"), b"").await?;

        if !is_repo {
            self.commit("metadata", None).await?;
            debug!("Workspace::init: seeded metadata commit");
        }

        info!(root = ?self.root, "workspace initialized");
        Ok(())
    }

    /// Return file contents; fails with `NotFound`.
    pub async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        debug!(path, "Workspace::read_file: called");
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full).await.map_err(|_| WorkspaceError::NotFound(path.to_string()))
    }

    /// Create parent directories as needed, overwrite atomically. No
    /// implicit commit.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        debug!(path, "Workspace::write_file: called");
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = full.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &full).await?;
        Ok(())
    }

    /// List files under `path`, excluding `.git`; deterministic order;
    /// empty when `path` is missing.
    pub fn list_files(&self, path: &str, recursive: bool) -> Vec<String> {
        debug!(path, recursive, "Workspace::list_files: called");
        let base = self.root.join(path);
        if !base.exists() {
            return Vec::new();
        }

        let walker = if recursive { WalkDir::new(&base) } else { WalkDir::new(&base).max_depth(1) };
        let mut files: Vec<String> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| !e.path().components().any(|c| c.as_os_str() == ".git"))
            .filter_map(|e| e.path().strip_prefix(&self.root).ok().map(|p| p.to_string_lossy().to_string()))
            .collect();
        files.sort();
        files
    }

    /// Regex match across files rooted at the workspace; optional glob
    /// filter.
    pub fn search_code(&self, pattern: &str, glob: Option<&str>) -> Result<Vec<SearchHit>, WorkspaceError> {
        debug!(pattern, ?glob, "Workspace::search_code: called");
        let re = regex::Regex::new(pattern)?;
        let matcher = glob.map(glob::Pattern::new).transpose()?;

        let mut hits = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().components().any(|c| c.as_os_str() == ".git") {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.root) {
                Ok(p) => p.to_string_lossy().to_string(),
                Err(_) => continue,
            };
            if let Some(m) = &matcher {
                if !m.matches(&rel) {
                    continue;
                }
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else { continue };
            for (idx, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    hits.push(SearchHit { file: rel.clone(), line: (idx + 1) as u32, content: line.to_string() });
                }
            }
        }
        Ok(hits)
    }

    /// Stage listed files (or all changes) and commit; returns the
    /// current head id unchanged when there is nothing to commit.
    pub async fn commit(&self, message: &str, files: Option<&[String]>) -> Result<String, WorkspaceError> {
        debug!(message, "Workspace::commit: called");
        match files {
            Some(paths) if !paths.is_empty() => {
                self.git(std::iter::once("add".to_string()).chain(paths.iter().cloned())).await?;
            }
            _ => {
                self.git(["add", "-A"]).await?;
            }
        }

        let status = self.git(["status", "--porcelain"]).await?;
        if status.stdout.is_empty() {
            debug!("Workspace::commit: no changes, returning current head");
            return self.head_id().await;
        }

        let output = self.git(["commit", "-m", message]).await?;
        if !output.status.success() {
            return Err(WorkspaceError::GitFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        self.head_id().await
    }

    async fn head_id(&self) -> Result<String, WorkspaceError> {
        let output = self.git(["rev-parse", "HEAD"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Textual diff of the working tree against `branch` (or `HEAD`).
    pub async fn diff(&self, branch: Option<&str>) -> Result<String, WorkspaceError> {
        debug!(?branch, "Workspace::diff: called");
        let target = branch.unwrap_or("HEAD");
        let output = self.git(["diff", target]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Deterministic branch name under the configured prefix; switches
    /// to it and returns the name.
    pub async fn create_branch(&self, agent_id: &str, subsystem: &str, component: &str) -> Result<String, WorkspaceError> {
        let name = format!("{}/{agent_id}/{subsystem}/{component}", self.branch_prefix);
        debug!(name, "Workspace::create_branch: called");
        let output = self.git(["checkout", "-b", &name]).await?;
        if !output.status.success() {
            return Err(WorkspaceError::GitFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(name)
    }

    /// Return to the primary branch.
    pub async fn checkout_main(&self) -> Result<(), WorkspaceError> {
        debug!("Workspace::checkout_main: called");
        let primary = self.resolve_primary_branch().await?;
        let output = self.git(["checkout", &primary]).await?;
        if !output.status.success() {
            return Err(WorkspaceError::GitFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        Ok(())
    }

    /// The repository's primary branch: `main` if it exists locally,
    /// `master` otherwise (for repos seeded outside our own `init()`).
    async fn resolve_primary_branch(&self) -> Result<String, WorkspaceError> {
        let output = self.git(["rev-parse", "--verify", "--quiet", "main"]).await?;
        if output.status.success() {
            return Ok("main".to_string());
        }
        Ok("master".to_string())
    }

    /// Map every local branch to its ahead-count and last commit summary.
    pub async fn get_branch_status(&self) -> Result<std::collections::HashMap<String, BranchStatus>, WorkspaceError> {
        debug!("Workspace::get_branch_status: called");
        let primary = self.resolve_primary_branch().await?;
        let output = self.git(["for-each-ref", "--format=%(refname:short)", "refs/heads/"]).await?;
        let branches: Vec<String> = String::from_utf8_lossy(&output.stdout).lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();

        let mut statuses = std::collections::HashMap::new();
        for branch in branches {
            let ahead_output = self.git(["rev-list", "--count", &format!("{primary}..{branch}")]).await?;
            let ahead = String::from_utf8_lossy(&ahead_output.stdout).trim().parse().unwrap_or(0);

            let summary_output = self.git(["log", "-1", "--format=%s", &branch]).await?;
            let summary = String::from_utf8_lossy(&summary_output.stdout).trim().to_string();

            statuses.insert(branch, BranchStatus { ahead, last_commit_summary: summary });
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_creates_metadata_subtree_and_seed_commits() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        assert!(ws.meta_root().join("tasks").is_dir());
        assert!(ws.meta_root().join("messages").is_dir());

        let log = ws.git(["log", "--oneline"]).await.unwrap();
        let count = String::from_utf8_lossy(&log.stdout).lines().count();
        assert!(count >= 2);
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        ws.write_file("src/boot.S", "; boot code").await.unwrap();
        let content = ws.read_file("src/boot.S").await.unwrap();
        assert_eq!(content, "; boot code");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        let err = ws.read_file("nope.txt").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound(_)));
    }

    #[tokio::test]
    async fn commit_with_no_changes_returns_current_head() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        let head_before = ws.head_id().await.unwrap();
        let head_after = ws.commit("nothing changed", None).await.unwrap();
        assert_eq!(head_before, head_after);
    }

    #[tokio::test]
    async fn commit_after_write_advances_head() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        let head_before = ws.head_id().await.unwrap();
        ws.write_file("kernel/main.c", "int main() { return 0; }").await.unwrap();
        let head_after = ws.commit("add kernel entry point", None).await.unwrap();
        assert_ne!(head_before, head_after);
    }

    #[tokio::test]
    async fn search_code_finds_matches() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("src/lib.rs", "fn boot() {}\nfn idle() {}\n").await.unwrap();

        let hits = ws.search_code("fn boot", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 1);
    }

    #[tokio::test]
    async fn search_code_glob_filter_is_directory_scoped() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("src/lib.rs", "fn boot() {}\n").await.unwrap();
        ws.write_file("kernel/boot.c", "void boot() {}\n").await.unwrap();

        let hits = ws.search_code("boot", Some("src/*.rs")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "src/lib.rs");

        let hits = ws.search_code("boot", Some("**/*.c")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "kernel/boot.c");
    }

    #[tokio::test]
    async fn search_code_rejects_invalid_glob() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        let err = ws.search_code("boot", Some("[unterminated")).unwrap_err();
        assert!(matches!(err, WorkspaceError::Glob(_)));
    }

    #[tokio::test]
    async fn list_files_excludes_git_internals() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        ws.write_file("a.txt", "x").await.unwrap();

        let files = ws.list_files("", true);
        assert!(files.iter().any(|f| f == "a.txt"));
        assert!(!files.iter().any(|f| f.contains(".git/")));
    }

    #[tokio::test]
    async fn create_branch_then_checkout_main() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();

        let branch = ws.create_branch("dev-01", "kernel", "boot").await.unwrap();
        assert_eq!(branch, "swarm/dev-01/kernel/boot");

        ws.checkout_main().await.unwrap();
        let output = ws.git(["branch", "--show-current"]).await.unwrap();
        let current = String::from_utf8_lossy(&output.stdout).trim().to_string();
        assert!(current == "main" || current == "master");
    }

    #[tokio::test]
    async fn branch_status_ahead_count_resolves_against_the_real_primary_branch() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "swarm");
        ws.init().await.unwrap();
        let primary = ws.resolve_primary_branch().await.unwrap();

        let branch = ws.create_branch("dev-01", "kernel", "boot").await.unwrap();
        ws.write_file("kernel/boot.c", "void boot() {}\n").await.unwrap();
        ws.commit("add boot entry", None).await.unwrap();
        ws.checkout_main().await.unwrap();

        let statuses = ws.get_branch_status().await.unwrap();
        assert_eq!(statuses[&branch].ahead, 1);
        assert_eq!(statuses[&primary].ahead, 0);
    }
}
