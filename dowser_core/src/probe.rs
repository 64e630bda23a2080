use crate::config::HarnessSettings;
use crate::coverage::EdgeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Marker inside a target argument that receives the input file path.
pub const INPUT_PLACEHOLDER: &str = "@@";

/// Extra wall-clock slack past the tracer's own timeout before the probe
/// kills the process itself.
const WATCHDOG_GRACE_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to spawn tracer {0:?}: {1}")]
    Spawn(PathBuf, String),
    #[error("Tracer exited with {0}")]
    NonZeroExit(String),
    #[error("Tracer exceeded the {0:?} wall-clock budget")]
    Timeout(Duration),
    #[error("Probe I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Coverage report unreadable: {0}")]
    Report(String),
    #[error("Temp file path {0:?} is not valid UTF-8")]
    NonUtf8Path(PathBuf),
}

/// A `CoverageProbe` runs the target once on a candidate input and reports
/// which coverage edges the execution touched.
///
/// One call is one trial: the probe owns the whole round trip of materializing
/// the input, running the tracer, and harvesting the report. Implementations
/// must be safe to share across worker threads, and must not leave scratch
/// files behind on any path, success or failure.
///
/// Edge identifiers are opaque strings. Two trials touched the same edge
/// exactly when the strings compare equal; nothing else about their format is
/// interpreted.
pub trait CoverageProbe: Send + Sync {
    fn probe(&self, input: &[u8]) -> Result<EdgeSet, ProbeError>;
}

/// Probe backed by an external `afl-showmap`-style tracer process.
///
/// The input lands in a fresh temp file per call. If any target argument
/// contains [`INPUT_PLACEHOLDER`] the file path is substituted there,
/// otherwise the file is piped to the target's stdin. The report is read from
/// a second temp file handed to the tracer via `-o`; both files are removed
/// when the call returns.
pub struct ShowmapProbe {
    settings: HarnessSettings,
}

impl ShowmapProbe {
    pub fn new(settings: HarnessSettings) -> Self {
        Self { settings }
    }

    fn scratch_file(&self, prefix: &str) -> Result<NamedTempFile, ProbeError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let file = match &self.settings.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    fn write_input(&self, input: &[u8]) -> Result<NamedTempFile, ProbeError> {
        let mut file = self.scratch_file("dowser-in-")?;
        file.write_all(input)?;
        file.flush()?;
        Ok(file)
    }
}

impl CoverageProbe for ShowmapProbe {
    fn probe(&self, input: &[u8]) -> Result<EdgeSet, ProbeError> {
        let input_file = self.write_input(input)?;
        let report_file = self.scratch_file("dowser-cov-")?;

        let input_path = input_file
            .path()
            .to_str()
            .ok_or_else(|| ProbeError::NonUtf8Path(input_file.path().to_path_buf()))?
            .to_string();
        let (target_args, input_via_file) =
            substitute_placeholder(&self.settings.target, &input_path);

        let mut cmd = Command::new(&self.settings.tracer);
        cmd.arg("-o")
            .arg(report_file.path())
            .arg("-t")
            .arg(self.settings.timeout_ms.to_string())
            .arg("-m")
            .arg(self.settings.memory_limit_mb.to_string())
            .arg("-q");
        if self.settings.qemu_mode {
            cmd.arg("-Q");
        }
        cmd.arg("--").args(&target_args);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        if input_via_file {
            cmd.stdin(Stdio::null());
        } else {
            cmd.stdin(Stdio::from(File::open(input_file.path())?));
        }

        let child = cmd
            .spawn()
            .map_err(|e| ProbeError::Spawn(self.settings.tracer.clone(), e.to_string()))?;

        // The tracer enforces timeout_ms on the target; the watchdog only
        // steps in when the tracer itself wedges.
        let budget =
            Duration::from_millis(self.settings.timeout_ms.saturating_add(WATCHDOG_GRACE_MS));
        let status = wait_with_timeout(child, budget)?;
        if !status.success() {
            return Err(ProbeError::NonZeroExit(describe_exit(&status)));
        }
        read_report(report_file.path())
    }
}

fn substitute_placeholder(target: &[String], input_path: &str) -> (Vec<String>, bool) {
    let mut replaced = false;
    let args = target
        .iter()
        .map(|arg| {
            if arg.contains(INPUT_PLACEHOLDER) {
                replaced = true;
                arg.replace(INPUT_PLACEHOLDER, input_path)
            } else {
                arg.clone()
            }
        })
        .collect();
    (args, replaced)
}

fn wait_with_timeout(mut child: Child, budget: Duration) -> Result<ExitStatus, ProbeError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if started.elapsed() > budget {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProbeError::Timeout(budget));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Io(e));
            }
        }
    }
}

fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {signal}");
        }
    }
    "abnormal termination".to_string()
}

fn read_report(path: &Path) -> Result<EdgeSet, ProbeError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ProbeError::Report(format!("{path:?}: {e}")))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod placeholder_tests {
    use super::*;

    #[test]
    fn placeholder_is_replaced_in_every_argument() {
        let target = vec![
            "converter".to_string(),
            "--in=@@".to_string(),
            "@@".to_string(),
        ];
        let (args, replaced) = substitute_placeholder(&target, "/tmp/input123");
        assert!(replaced);
        assert_eq!(args[0], "converter");
        assert_eq!(args[1], "--in=/tmp/input123");
        assert_eq!(args[2], "/tmp/input123");
    }

    #[test]
    fn target_without_placeholder_is_untouched() {
        let target = vec!["parser".to_string(), "--strict".to_string()];
        let (args, replaced) = substitute_placeholder(&target, "/tmp/input123");
        assert!(!replaced);
        assert_eq!(args, target);
    }
}
