//! Subprocess driver for the external graph-query engine.
//!
//! One fresh process per script: the script goes to stdin, stdin is closed,
//! and the whole transcript is collected from stdout. Nothing is kept alive
//! between queries.

use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::infra::config::EngineConfig;

/// Anything that can turn a script into a raw transcript.
///
/// The production implementation spawns the engine; tests replay recorded
/// transcripts.
pub trait QueryEngine: Send + Sync
{
    fn run(
        &self,
        script: &str,
    ) -> Result<String, EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError
{
    #[error("failed to start {}", executable.display())]
    Spawn
    {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("engine pipe failed")]
    Io(#[from] io::Error),

    #[error("engine did not finish within {0:?}")]
    Timeout(Duration),

    #[error("engine exited with {status}: {stderr}")]
    ExitStatus
    {
        status: ExitStatus,
        stderr: String,
    },
}

/// Spawns the engine executable with the engine home as working directory.
#[derive(Debug, Clone)]
pub struct JoernProcess
{
    executable: PathBuf,
    home: PathBuf,
    timeout: Option<Duration>,
}

impl JoernProcess
{
    pub fn new(
        executable: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
    ) -> Self
    {
        Self { executable: executable.into(), home: home.into(), timeout: None }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self
    {
        Self::new(cfg.executable(), cfg.home()).with_timeout(cfg.timeout())
    }

    /// Bound each run; `None` waits forever.
    pub fn with_timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self
    {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path
    {
        &self.executable
    }

    pub fn home(&self) -> &Path
    {
        &self.home
    }
}

impl QueryEngine for JoernProcess
{
    #[instrument(skip_all, fields(engine = %self.executable.display()))]
    fn run(
        &self,
        script: &str,
    ) -> Result<String, EngineError>
    {
        let started = Instant::now();

        let mut child = Command::new(&self.executable)
            .current_dir(&self.home)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn { executable: self.executable.clone(), source })?;

        // Drain both pipes while waiting so a chatty engine cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take()
        {
            match stdin.write_all(script.as_bytes())
            {
                Ok(()) => {}
                // The engine may exit before reading everything; its status tells the story
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe =>
                {
                    debug!("engine closed stdin early")
                }
                Err(e) => return Err(abort(child, e.into())),
            }
        }

        let status = match wait_bounded(&mut child, self.timeout)
        {
            Ok(status) => status,
            Err(e) => return Err(abort(child, e)),
        };

        let out = collect(stdout);
        let err = collect(stderr);

        debug!(
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_bytes = out.len(),
            "engine finished"
        );

        if !status.success()
        {
            return Err(EngineError::ExitStatus { status, stderr: err.trim().to_string() });
        }

        Ok(out)
    }
}

/// Exit status within `timeout`. Every error leaves the child running; the
/// caller must `abort` it.
fn wait_bounded(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, EngineError>
{
    let Some(limit) = timeout
    else
    {
        return Ok(child.wait()?);
    };

    match child.wait_timeout(limit)?
    {
        Some(status) => Ok(status),
        None =>
        {
            warn!(limit = ?limit, "engine timed out, killing it");
            Err(EngineError::Timeout(limit))
        }
    }
}

/// Kill and reap a child we are giving up on. Reader threads are left to
/// finish on their own once the pipes close.
fn abort(
    mut child: Child,
    err: EngineError,
) -> EngineError
{
    let _ = child.kill();
    let _ = child.wait();
    err
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
{
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String
{
    let bytes = handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests
{
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script_engine(
        dir: &Path,
        body: &str,
    ) -> JoernProcess
    {
        let exe = dir.join("fake-joern");
        std::fs::write(&exe, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        JoernProcess::new(exe, dir)
    }

    #[test]
    fn stdin_script_is_echoed_back()
    {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "cat");

        let out = engine
            .run("importCpg(\"x\")\ncpg.method.toJson\n")
            .unwrap();
        assert_eq!(out, "importCpg(\"x\")\ncpg.method.toJson\n");
    }

    #[test]
    fn runs_in_engine_home()
    {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "cat >/dev/null; pwd");

        let out = engine.run("").unwrap();
        let reported = PathBuf::from(out.trim());
        assert_eq!(
            reported
                .canonicalize()
                .unwrap(),
            dir.path()
                .canonicalize()
                .unwrap()
        );
    }

    #[test]
    fn non_zero_exit_carries_stderr()
    {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "cat >/dev/null; echo boom >&2; exit 3");

        match engine.run("x\n")
        {
            Err(EngineError::ExitStatus { status, stderr }) =>
            {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_executable_is_a_spawn_error()
    {
        let engine = JoernProcess::new("/no/such/joern", std::env::temp_dir());

        assert!(matches!(engine.run("x"), Err(EngineError::Spawn { .. })));
    }

    #[test]
    fn slow_engine_is_killed()
    {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "exec sleep 10")
            .with_timeout(Some(Duration::from_millis(200)));

        let started = Instant::now();
        assert!(matches!(engine.run(""), Err(EngineError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn abandoned_engine_is_killed_and_reaped()
    {
        let dir = tempfile::tempdir().unwrap();
        let engine = script_engine(dir.path(), "echo $$ > engine.pid; exec sleep 10")
            .with_timeout(Some(Duration::from_millis(300)));

        assert!(matches!(engine.run(""), Err(EngineError::Timeout(_))));

        let pid = std::fs::read_to_string(dir.path().join("engine.pid")).unwrap();
        let alive = Command::new("kill")
            .args(["-0", pid.trim()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success(), "engine pid {} still running", pid.trim());
    }
}
