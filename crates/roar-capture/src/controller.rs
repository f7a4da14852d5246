//! Capture subprocess controller.
//!
//! Owns one external capture process: spawns it with piped stdio, merges
//! its stdout and stderr into a single line stream, and negotiates a
//! cooperative stop.
//!
//! Collaborator contract: the capture binary runs in interactive mode and,
//! on reading the single byte `q` from stdin, closes its current output
//! segment and exits on its own. The controller never force-kills the
//! process as part of a stop; the kill-on-drop backstop only fires if the
//! controller is dropped without `wait()`.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::debug;

use crate::command::CaptureCommand;
use crate::error::{CaptureError, CaptureResult};

/// Capacity of the merged output-line channel. Output is log-volume; the
/// readers block once the consumer stops draining after a stop request.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Running capture subprocess with a merged output-line stream.
pub struct CaptureController {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::Receiver<String>,
}

impl CaptureController {
    /// Spawn the capture process for the given command.
    pub fn spawn(cmd: &CaptureCommand) -> CaptureResult<Self> {
        Self::spawn_program(cmd.program_name(), &cmd.build_args())
    }

    /// Spawn an arbitrary program under the same controller contract.
    pub fn spawn_program(program: &str, args: &[String]) -> CaptureResult<Self> {
        debug!("Spawning capture process: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (tx, lines) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        if let Some(stdout) = stdout {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            });
        }

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(Self {
            child,
            stdin,
            lines,
        })
    }

    /// OS process ID, while the process is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Next combined output line; `None` once both streams have closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Ask the process to stop by writing the interactive quit byte.
    ///
    /// The caller should stop reading output after this and `wait()` for
    /// the process to exit on its own.
    pub async fn request_stop(&mut self) -> CaptureResult<()> {
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.write_all(b"q").await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    /// Wait for the process to exit; nonzero exit is an error.
    pub async fn wait(mut self) -> CaptureResult<()> {
        let status = self.child.wait().await?;

        if status.success() {
            Ok(())
        } else {
            Err(CaptureError::ProcessExit {
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::segment_filename;

    fn sh(script: &str) -> CaptureController {
        CaptureController::spawn_program("sh", &["-c".to_string(), script.to_string()]).unwrap()
    }

    #[tokio::test]
    async fn test_lines_and_clean_exit() {
        let mut ctl = sh("echo \"Opening 'cam1-20240101-120000.mp4' for writing\"");

        let mut segments = Vec::new();
        while let Some(line) = ctl.next_line().await {
            if let Some(name) = segment_filename(&line) {
                segments.push(name.to_string());
            }
        }

        assert_eq!(segments, vec!["cam1-20240101-120000.mp4"]);
        ctl.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_merges_stdout_and_stderr() {
        let mut ctl = sh("echo on-stdout; echo on-stderr 1>&2");

        let mut lines = Vec::new();
        while let Some(line) = ctl.next_line().await {
            lines.push(line);
        }

        assert!(lines.contains(&"on-stdout".to_string()));
        assert!(lines.contains(&"on-stderr".to_string()));
        ctl.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let ctl = sh("exit 3");
        let err = ctl.wait().await.unwrap_err();

        match err {
            CaptureError::ProcessExit { code } => assert_eq!(code, Some(3)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_quit_byte_stops_the_process() {
        // Stand-in for the interactive capture binary: exits cleanly after
        // reading one byte of stdin.
        let mut ctl = sh("head -c 1 > /dev/null");

        ctl.request_stop().await.unwrap();
        ctl.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_pid_is_reported() {
        let ctl = sh("sleep 0.05");
        assert!(ctl.pid().is_some());
        ctl.wait().await.unwrap();
    }
}
