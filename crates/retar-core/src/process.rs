//! External-process plumbing.
//!
//! Every compressor, decompressor and patch tool runs through here. Two
//! contracts live in this module:
//!
//! - **Environment**: children always run with `LC_ALL=C` so filename
//!   bytes are never transcoded, and with `GZIP`/`BZIP`/`BZIP2` scrubbed
//!   so user environment defaults cannot skew a replay.
//! - **Reaping**: a spawned child is always reaped. [`ChildGuard`]'s drop
//!   path kills and waits, which is what allows the compare loop to bail
//!   out on the first mismatching byte without leaking the compressor.

use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Child;
use std::process::ChildStdout;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;

use log::debug;

use crate::Error;
use crate::Result;

/// Builds a [`Command`] honouring the environment contract.
pub fn command<S: AsRef<OsStr>>(program: S) -> Command {
    let mut cmd = Command::new(program);
    cmd.env("LC_ALL", "C");
    cmd.env_remove("GZIP");
    cmd.env_remove("BZIP");
    cmd.env_remove("BZIP2");
    cmd
}

/// A spawned child that is killed and reaped if not waited on.
#[derive(Debug)]
pub struct ChildGuard {
    program: String,
    child: Option<Child>,
}

impl ChildGuard {
    /// Wraps a freshly spawned child.
    #[must_use]
    pub fn new(child: Child, program: &str) -> Self {
        Self {
            program: program.to_string(),
            child: Some(child),
        }
    }

    /// Takes the child's piped stdout, if any.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|c| c.stdout.take())
    }

    /// Terminates the child immediately and reaps it.
    pub fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!("killing {}", self.program);
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Waits for the child to exit.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        match self.child.take() {
            Some(mut child) => Ok(child.wait()?),
            None => Err(Error::SubprocessFailure {
                program: self.program.clone(),
                status: "already reaped".to_string(),
            }),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

fn spawn_failure(program: &str, err: &std::io::Error) -> Error {
    Error::SubprocessFailure {
        program: program.to_string(),
        status: format!("failed to start: {err}"),
    }
}

fn check_status(program: &str, status: ExitStatus, tolerated: &[i32]) -> Result<()> {
    if status.success() || status.code().is_some_and(|c| tolerated.contains(&c)) {
        Ok(())
    } else {
        Err(Error::SubprocessFailure {
            program: program.to_string(),
            status: status.to_string(),
        })
    }
}

/// Runs `program` as a file-to-file filter: stdin from `input`, stdout
/// into `output` (created or truncated). Exit codes in `tolerated` count
/// as success alongside 0.
///
/// # Errors
///
/// Returns [`Error::SubprocessFailure`] when the program cannot start or
/// exits outside the tolerated set.
pub fn run_filter<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    input: &Path,
    output: &Path,
    tolerated: &[i32],
) -> Result<()> {
    let stdin = File::open(input)?;
    let stdout = File::create(output)?;
    let mut child = command(program)
        .args(args)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_failure(program, &e))?;
    let status = child.wait()?;
    check_status(program, status, tolerated)
}

/// Runs `program` as a filter over `input` and compares its stdout
/// byte-for-byte against the file at `expected`.
///
/// The child is killed the instant a mismatching byte is seen; a full
/// replay of a wrong candidate is never paid for. Returns `Ok(true)` only
/// when the streams are identical to the last byte and the child exited
/// successfully.
///
/// # Errors
///
/// Returns [`Error::SubprocessFailure`] when the program cannot start,
/// and I/O errors from reading either stream.
pub fn output_matches_file<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    input: &Path,
    expected: &Path,
) -> Result<bool> {
    let stdin = File::open(input)?;
    let child = command(program)
        .args(args)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_failure(program, &e))?;
    let mut guard = ChildGuard::new(child, program);
    let Some(mut produced) = guard.take_stdout() else {
        return Err(Error::SubprocessFailure {
            program: program.to_string(),
            status: "no stdout pipe".to_string(),
        });
    };
    let mut want = File::open(expected)?;

    let mut got_buf = [0u8; 16 * 1024];
    let mut want_buf = [0u8; 16 * 1024];
    loop {
        let n = produced.read(&mut got_buf)?;
        if n == 0 {
            break;
        }
        if !read_full(&mut want, &mut want_buf[..n])? {
            // Expected stream ended early.
            guard.kill();
            return Ok(false);
        }
        if got_buf[..n] != want_buf[..n] {
            guard.kill();
            return Ok(false);
        }
    }

    let trailing = want.read(&mut want_buf[..1])?;
    let status = guard.wait()?;
    Ok(trailing == 0 && status.success())
}

/// Fills `buf` from `reader`, returning `Ok(false)` on premature EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}
