//! Version-control collaborator.

use crate::error::Error;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The git operations the upgrade flows need.
pub trait VersionControl {
    /// Update remote-tracking refs.
    fn fetch(&self) -> Result<()>;

    /// Create (or reset) `branch` at `start_point` and check it out.
    fn checkout_new_branch(&self, branch: &str, start_point: &str) -> Result<()>;

    /// Rebase the current branch onto `upstream`.
    ///
    /// Conflicting hunks resolve to `upstream`'s content.
    fn rebase_onto(&self, upstream: &str) -> Result<()>;

    fn push(&self, branch: &str, force: bool) -> Result<()>;

    /// Stage exactly `path`.
    fn stage(&self, path: &Path) -> Result<()>;

    /// Commit what is staged.
    fn commit(&self, message: &str) -> Result<()>;

    /// Whether the working tree has uncommitted changes.
    fn is_dirty(&self) -> Result<bool>;

    /// Number of commits on the current branch that `upstream` lacks.
    fn commits_ahead(&self, upstream: &str) -> Result<usize>;

    /// Remote-tracking name of `branch`.
    fn remote_ref(&self, branch: &str) -> String {
        format!("origin/{branch}")
    }
}

/// `git` subprocess in a repository checkout.
pub struct Git {
    root: PathBuf,
    remote: String,
}

impl Git {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote: "origin".to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        log::debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::Vcs {
                command: args.join(" "),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(Error::Vcs {
                command: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }
}

impl VersionControl for Git {
    fn fetch(&self) -> Result<()> {
        self.run(&["fetch", "--prune", &self.remote])?;
        Ok(())
    }

    fn checkout_new_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        self.run(&["checkout", "-B", branch, start_point])?;
        Ok(())
    }

    fn rebase_onto(&self, upstream: &str) -> Result<()> {
        // While rebasing, "ours" is the upstream being replayed onto.
        if let Err(e) = self.run(&["rebase", "--strategy-option=ours", upstream]) {
            let _ = self.run(&["rebase", "--abort"]);
            return Err(e);
        }
        Ok(())
    }

    fn push(&self, branch: &str, force: bool) -> Result<()> {
        let mut args = vec!["push", "--set-upstream"];
        if force {
            args.push("--force");
        }
        args.push(self.remote.as_str());
        args.push(branch);
        self.run(&args)?;
        Ok(())
    }

    fn stage(&self, path: &Path) -> Result<()> {
        // Relative paths are relative to the process, not to `self.root`.
        let path = std::path::absolute(path).map_err(|e| Error::Vcs {
            command: format!("add -- {}", path.display()),
            message: e.to_string(),
        })?;
        self.run(&["add", "--", &path.to_string_lossy()])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "--message", message])?;
        Ok(())
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(!self.run(&["status", "--porcelain"])?.is_empty())
    }

    fn commits_ahead(&self, upstream: &str) -> Result<usize> {
        let range = format!("{upstream}..HEAD");
        let count = self.run(&["rev-list", "--count", &range])?;
        let ahead = count.parse::<usize>().map_err(|_| Error::Vcs {
            command: format!("rev-list --count {range}"),
            message: format!("unexpected output '{count}'"),
        })?;
        Ok(ahead)
    }

    fn remote_ref(&self, branch: &str) -> String {
        format!("{}/{branch}", self.remote)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    /// Records every call instead of running git.
    #[derive(Default)]
    pub struct RecordingVcs {
        pub calls: RefCell<Vec<String>>,
        pub dirty: bool,
        pub ahead: usize,
    }

    impl RecordingVcs {
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl VersionControl for RecordingVcs {
        fn fetch(&self) -> Result<()> {
            self.record("fetch".to_string());
            Ok(())
        }

        fn checkout_new_branch(&self, branch: &str, start_point: &str) -> Result<()> {
            self.record(format!("checkout {branch} {start_point}"));
            Ok(())
        }

        fn rebase_onto(&self, upstream: &str) -> Result<()> {
            self.record(format!("rebase {upstream}"));
            Ok(())
        }

        fn push(&self, branch: &str, force: bool) -> Result<()> {
            self.record(format!("push {branch}{}", if force { " --force" } else { "" }));
            Ok(())
        }

        fn stage(&self, path: &Path) -> Result<()> {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            self.record(format!("add {}", name.unwrap_or_default()));
            Ok(())
        }

        fn commit(&self, message: &str) -> Result<()> {
            self.record(format!("commit {message}"));
            Ok(())
        }

        fn is_dirty(&self) -> Result<bool> {
            Ok(self.dirty)
        }

        fn commits_ahead(&self, _upstream: &str) -> Result<usize> {
            Ok(self.ahead)
        }
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn init_repo(dir: &Path) -> Git {
        let git = Git::new(dir);
        git.run(&["init", "--quiet"]).unwrap();
        git.run(&["config", "user.email", "test@example.com"]).unwrap();
        git.run(&["config", "user.name", "Test"]).unwrap();
        git
    }

    #[test]
    fn test_stage_commit_and_dirty() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let git = init_repo(dir.path());
        let file = dir.path().join("main.tf");
        fs::write(&file, "module \"vpc\" {}\n").unwrap();
        assert!(git.is_dirty().unwrap());

        git.stage(&file).unwrap();
        git.commit("Add vpc").unwrap();
        assert!(!git.is_dirty().unwrap());
        assert_eq!(git.run(&["log", "--format=%s"]).unwrap(), "Add vpc");
    }

    #[test]
    fn test_stage_from_project_subdirectory() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        init_repo(&root);
        let project = root.join("infra");
        fs::create_dir(&project).unwrap();
        let file = project.join("main.tf");
        fs::write(&file, "module \"vpc\" {}\n").unwrap();

        let git = Git::new(&project);
        git.stage(&file).unwrap();
        git.commit("Add vpc").unwrap();
        assert!(!git.is_dirty().unwrap());
        assert_eq!(
            git.run(&["log", "--name-only", "--format="]).unwrap(),
            "infra/main.tf"
        );
    }

    #[test]
    fn test_commits_ahead() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let git = init_repo(dir.path());
        let file = dir.path().join("main.tf");
        fs::write(&file, "module \"vpc\" {}\n").unwrap();
        git.stage(&file).unwrap();
        git.commit("Add vpc").unwrap();
        git.run(&["branch", "base"]).unwrap();

        fs::write(&file, "module \"vpc\" {}\nmodule \"dns\" {}\n").unwrap();
        git.stage(&file).unwrap();
        git.commit("Add dns").unwrap();

        assert_eq!(git.commits_ahead("base").unwrap(), 1);
        assert_eq!(git.commits_ahead("HEAD").unwrap(), 0);
        assert!(git.commits_ahead("no-such-branch").is_err());
    }

    #[test]
    fn test_failed_command_is_vcs_error() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let git = init_repo(dir.path());
        let err = git.commit("nothing staged").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Vcs { .. })));
    }

    #[test]
    fn test_remote_ref() {
        assert_eq!(Git::new(".").remote_ref("main"), "origin/main");
    }
}
