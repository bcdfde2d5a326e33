use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Lines of stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// A captured external command result.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program args..` to completion, optionally feeding `stdin`. A non-zero exit is
/// reported in the output, not as an error.
pub async fn capture(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&str>,
) -> Result<CommandOutput> {
    debug!("Running: {} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn '{}'", program))?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes())
                .await
                .with_context(|| format!("Failed to write stdin of '{}'", program))?;
        }
    }

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("Failed to wait for '{}'", program))?;

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`capture`], but a non-zero exit becomes an error carrying the stderr tail.
pub async fn run(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&str>,
) -> Result<String> {
    let output = capture(program, args, cwd, stdin).await?;
    if !output.success {
        bail!(
            "'{} {}' exited with {}: {}",
            program,
            args.first().map(String::as_str).unwrap_or_default(),
            output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            stderr_tail(&output.stderr)
        );
    }
    Ok(output.stdout)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

pub(crate) fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
