//! Conditional commit of the generated README

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {args} exited with {code:?}: {stderr}")]
    Git {
        args: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Result of [`commit_if_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Unchanged,
}

/// Exit code of a finished process; `128 + signal` when killed on Unix
fn exit_status_code(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}

/// Git runner bound to one working tree
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Run git and return its exit code and stderr
    async fn run(&self, args: &[&str]) -> Result<(Option<i32>, String), PublishError> {
        debug!(dir = %self.dir.display(), "git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PublishError::Spawn {
                args: args.join(" "),
                source: e,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok((exit_status_code(&output.status), stderr))
    }

    /// Run git and fail on a non-zero exit
    async fn run_checked(&self, args: &[&str]) -> Result<(), PublishError> {
        match self.run(args).await? {
            (Some(0), _) => Ok(()),
            (code, stderr) => Err(PublishError::Git {
                args: args.join(" "),
                code,
                stderr,
            }),
        }
    }

    /// Stage `path` and commit it when the staged content differs
    pub async fn commit_if_changed(
        &self,
        path: &Path,
        message: &str,
    ) -> Result<CommitOutcome, PublishError> {
        let path = path.to_string_lossy().into_owned();
        let path = path.as_str();
        self.run_checked(&["add", "--", path]).await?;

        // exit 1 means there are staged differences
        match self.run(&["diff", "--staged", "--quiet", "--", path]).await? {
            (Some(0), _) => {
                info!("No changes to commit");
                return Ok(CommitOutcome::Unchanged);
            }
            (Some(1), _) => {}
            (code, stderr) => {
                return Err(PublishError::Git {
                    args: "diff --staged --quiet".into(),
                    code,
                    stderr,
                });
            }
        }

        self.run_checked(&["commit", "-m", message, "--", path]).await?;
        info!("Committed {} with message '{}'", path, message);
        Ok(CommitOutcome::Committed)
    }

    pub async fn push(&self) -> Result<(), PublishError> {
        self.run_checked(&["push"]).await?;
        info!("Pushed changes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn init_repo(dir: &Path) -> GitRepo {
        let repo = GitRepo::new(dir);
        repo.run_checked(&["init", "-q"]).await.unwrap();
        repo.run_checked(&["config", "user.email", "bot@example.com"])
            .await
            .unwrap();
        repo.run_checked(&["config", "user.name", "bot"]).await.unwrap();
        repo.run_checked(&["config", "commit.gpgsign", "false"])
            .await
            .unwrap();
        repo
    }

    async fn commit_count(repo: &GitRepo) -> usize {
        let output = Command::new("git")
            .args(["rev-list", "--count", "HEAD"])
            .current_dir(&repo.dir)
            .output()
            .await
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().parse().unwrap_or(0)
    }

    #[tokio::test]
    async fn test_commit_only_when_content_changes() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        let readme = Path::new("README.md");
        let message = "Auto-update README from Firebase data [skip ci]";

        std::fs::write(dir.path().join(readme), "first").unwrap();
        assert_eq!(
            repo.commit_if_changed(readme, message).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(commit_count(&repo).await, 1);

        // byte-identical rewrite
        std::fs::write(dir.path().join(readme), "first").unwrap();
        assert_eq!(
            repo.commit_if_changed(readme, message).await.unwrap(),
            CommitOutcome::Unchanged
        );
        assert_eq!(commit_count(&repo).await, 1);

        std::fs::write(dir.path().join(readme), "second").unwrap();
        assert_eq!(
            repo.commit_if_changed(readme, message).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(commit_count(&repo).await, 2);
    }

    #[tokio::test]
    async fn test_git_failure_carries_stderr() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = GitRepo::new(dir.path());

        let err = repo
            .commit_if_changed(Path::new("README.md"), "msg")
            .await
            .unwrap_err();
        match err {
            PublishError::Git { stderr, .. } => assert!(!stderr.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exit_code_passthrough() {
        let status = std::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .status();
        if let Ok(status) = status {
            assert_eq!(exit_status_code(&status), Some(3));
        }
    }
}
