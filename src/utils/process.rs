use crate::error::{PinupError, Result};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// An external command invoked with a hard wall-clock limit.
///
/// `prefix_args` are passed before the per-call arguments, which lets a shell
/// stand in for the real binary (`sh -c '<script>' crane ...`).
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: String,
    prefix_args: Vec<String>,
    timeout: Duration,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the tool and return its trimmed stdout.
    ///
    /// A missing binary, a non-zero exit and a timeout are all reported as
    /// `PinupError::ExternalTool`; the child is killed on timeout.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let display = format!("{} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    PinupError::ExternalTool(format!("{} not found in PATH", self.program))
                } else {
                    PinupError::ExternalTool(format!("Failed to spawn '{display}': {e}"))
                }
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_timeout(&mut child, self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PinupError::ExternalTool(format!(
                    "'{display}' timed out after {}s",
                    self.timeout.as_secs_f32()
                )));
            }
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            return Err(PinupError::ExternalTool(format!(
                "'{display}' exited with {}: {}",
                status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr.trim()
            )));
        }

        Ok(stdout.trim().to_string())
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// Pipes are drained on their own threads so a chatty child never blocks on a
// full pipe while we poll for its exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
