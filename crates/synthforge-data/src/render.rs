//! Runs emitted scripts through Isaac Sim's `python.sh`.

use crate::error::RenderInvocationError;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use synthforge_core::RenderConfig;
use tokio::process::Command;

/// Longest stderr tail kept in a failure
const STDERR_EXCERPT_CHARS: usize = 2000;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderJob {
    pub script: PathBuf,
    pub output: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderFailure {
    pub script: PathBuf,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    pub rendered: Vec<PathBuf>,
    pub failures: Vec<RenderFailure>,
}

pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Configured executable, if it exists on disk
    pub fn executable(&self) -> Result<&Path, RenderInvocationError> {
        match &self.config.executable {
            Some(path) if path.is_file() => Ok(path.as_path()),
            other => Err(RenderInvocationError::ToolMissing { executable: other.clone() }),
        }
    }

    /// Run `<executable> <script> <output>` to completion
    pub async fn render(&self, script: &Path, output: &Path) -> Result<(), RenderInvocationError> {
        let executable = self.executable()?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|source| RenderInvocationError::Io { path: parent.to_path_buf(), source })?;
        }
        // A leftover file from an earlier run would mask a failed render
        match std::fs::remove_file(output) {
            Ok(()) => tracing::debug!("Removed stale {}", output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RenderInvocationError::Io { path: output.to_path_buf(), source })
            }
        }

        tracing::info!("Rendering {} -> {}", script.display(), output.display());
        let child = Command::new(executable)
            .arg(script)
            .arg(output)
            .args(&self.config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderInvocationError::Spawn {
                executable: executable.to_path_buf(),
                source,
            })?;

        let result = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderInvocationError::Timeout {
                script: script.to_path_buf(),
                after: self.config.timeout,
            })?;
        let finished = result.map_err(|source| RenderInvocationError::Spawn {
            executable: executable.to_path_buf(),
            source,
        })?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(RenderInvocationError::Failed {
                script: script.to_path_buf(),
                code: finished.status.code(),
                stderr: tail(stderr.trim(), STDERR_EXCERPT_CHARS).to_string(),
            });
        }

        if !output.is_file() {
            return Err(RenderInvocationError::NoOutput {
                script: script.to_path_buf(),
                output: output.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Render jobs one after another. Failures are recorded and the batch continues.
    pub async fn render_batch(&self, jobs: &[RenderJob]) -> RenderReport {
        let mut report = RenderReport::default();

        if let Err(e) = self.executable() {
            tracing::warn!("Skipping {} renders: {}", jobs.len(), e);
            report.failures = jobs
                .iter()
                .map(|job| RenderFailure { script: job.script.clone(), error: e.to_string() })
                .collect();
            return report;
        }

        let pb = ProgressBar::new(jobs.len() as u64);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40}] {pos}/{len} renders")
            .expect("template error"));

        for job in jobs {
            match self.render(&job.script, &job.output).await {
                Ok(()) => report.rendered.push(job.output.clone()),
                Err(e) => {
                    tracing::warn!("Render failed for {}: {}", job.script.display(), e);
                    report.failures.push(RenderFailure { script: job.script.clone(), error: e.to_string() });
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("Rendering complete");

        tracing::info!("Rendered {}/{} scripts", report.rendered.len(), jobs.len());
        report
    }
}

fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    match s.char_indices().nth(count - max_chars) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    /// `/bin/sh` plays python.sh, so each "script" is a shell script whose $1 is the output path
    fn shell_renderer() -> Renderer {
        renderer(Some(PathBuf::from("/bin/sh")))
    }

    fn renderer(executable: Option<PathBuf>) -> Renderer {
        Renderer::new(RenderConfig {
            executable,
            timeout: Duration::from_secs(10),
            ..RenderConfig::default()
        })
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("{body}\n")).unwrap();
        path
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let err = renderer(None)
            .render(Path::new("a.py"), Path::new("a.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderInvocationError::ToolMissing { executable: None }));

        let err = renderer(Some(PathBuf::from("/no/such/python.sh")))
            .render(Path::new("a.py"), Path::new("a.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/python.sh"));
    }

    #[tokio::test]
    async fn test_successful_render() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "variation_000.py", "echo video > \"$1\"");
        let output = dir.path().join("renders").join("variation_000.mp4");
        shell_renderer().render(&s, &output).await.unwrap();
        assert!(output.is_file());
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "s.py", "echo 'PhysX init failed' >&2\nexit 3");
        let err = shell_renderer().render(&s, &dir.path().join("s.mp4")).await.unwrap_err();
        match err {
            RenderInvocationError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "PhysX init failed");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn test_success_without_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("s.mp4");
        std::fs::write(&output, b"stale").unwrap();
        let s = script(dir.path(), "s.py", "exit 0");
        let err = shell_renderer().render(&s, &output).await.unwrap_err();
        assert!(matches!(err, RenderInvocationError::NoOutput { .. }));
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let jobs: Vec<RenderJob> = [("good_0", true), ("bad_1", false), ("good_2", true)]
            .iter()
            .map(|(name, ok)| {
                let body = if *ok { "echo ok > \"$1\"" } else { "exit 1" };
                RenderJob {
                    script: script(dir.path(), &format!("{name}.py"), body),
                    output: dir.path().join(format!("{name}.mp4")),
                }
            })
            .collect();

        let report = shell_renderer().render_batch(&jobs).await;
        assert_eq!(report.rendered.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].script, dir.path().join("bad_1.py"));
    }

    #[tokio::test]
    async fn test_batch_without_tool_records_every_job() {
        let jobs = vec![
            RenderJob { script: "a.py".into(), output: "a.mp4".into() },
            RenderJob { script: "b.py".into(), output: "b.mp4".into() },
        ];
        let report = renderer(None).render_batch(&jobs).await;
        assert!(report.rendered.is_empty());
        assert_eq!(report.failures.len(), 2);
    }
}
