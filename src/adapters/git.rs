use super::command::{args, capture, run};
use crate::collaborators::{GitSync, GitSyncResult};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

const GIT: &str = "git";
const COMMIT_MESSAGE: &str = "chore: update Alpine image manifest [skip ci]";

/// Commits the mirrored manifest with the git CLI and pushes the current branch.
pub struct GitCliSync {
    repo_root: PathBuf,
    manifest_path: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitCliSync {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            manifest_path: manifest_path.into(),
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    /// Manifest path as git sees it, relative to the repository root when possible.
    fn pathspec(&self) -> String {
        self.manifest_path
            .strip_prefix(&self.repo_root)
            .unwrap_or(&self.manifest_path)
            .display()
            .to_string()
    }

    async fn git(&self, list: Vec<String>) -> Result<String> {
        run(GIT, &list, Some(&self.repo_root), None).await
    }

    async fn sync(&self) -> Result<GitSyncResult> {
        let pathspec = self.pathspec();

        self.git(args(["add", "--", pathspec.as_str()]))
            .await
            .context("git add failed")?;

        if !has_staged_changes(&self.repo_root, &pathspec).await? {
            return Ok(GitSyncResult::no_changes());
        }

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.git(args([
            "-c",
            name.as_str(),
            "-c",
            email.as_str(),
            "commit",
            "-m",
            COMMIT_MESSAGE,
            "--",
            pathspec.as_str(),
        ]))
        .await
        .context("git commit failed")?;

        self.git(args(["push"])).await.context("git push failed")?;

        let head = self
            .git(args(["rev-parse", "HEAD"]))
            .await
            .context("git rev-parse failed")?;
        Ok(GitSyncResult::pushed(head.trim()))
    }
}

/// `git diff --cached --quiet` exits 0 when nothing is staged and 1 when something is.
async fn has_staged_changes(repo_root: &Path, pathspec: &str) -> Result<bool> {
    let output = capture(
        GIT,
        &args(["diff", "--cached", "--quiet", "--", pathspec]),
        Some(repo_root),
        None,
    )
    .await?;

    match output.code {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => bail!("git diff failed: {}", output.stderr.trim()),
    }
}

#[async_trait]
impl GitSync for GitCliSync {
    async fn commit_and_push_manifest(&self) -> GitSyncResult {
        debug!("Syncing {} to git", self.manifest_path.display());
        match self.sync().await {
            Ok(result) => result,
            Err(e) => GitSyncResult::failed(format!("{:#}", e)),
        }
    }
}
