use crate::tools::media_tools::{FrameStylizer, StylizeRequest};
use crate::tools::task_handle::{ProgressEvent, TaskHandle};
use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

/// `primitive -v` 每加入一個形狀輸出一行，例如 `42: t=1.234, score=0.051, n=1000, n/s=810`
static STEP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):\s+t=").expect("Invalid step line pattern"));

pub struct PrimitiveStylizer {
    binary: String,
}

impl PrimitiveStylizer {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn build_command(&self, request: &StylizeRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-i")
            .arg(request.source)
            .arg("-o")
            .arg(request.destination)
            .args(["-n", &request.shapes.to_string(), "-v"])
            .args(["-m", &request.options.mode.to_string()])
            .args(["-r", &request.options.resize.to_string()])
            .args(["-s", &request.options.size.to_string()]);
        cmd
    }
}

impl FrameStylizer for PrimitiveStylizer {
    fn spawn(&self, request: &StylizeRequest<'_>) -> Result<TaskHandle> {
        let mut command = self.build_command(request);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("啟動 {:?}", command);
        let child = command
            .spawn()
            .with_context(|| format!("無法啟動 {}", self.binary))?;

        Ok(TaskHandle::from_child(child, parse_progress_line))
    }
}

#[must_use]
pub fn parse_progress_line(line: &str) -> ProgressEvent {
    STEP_LINE
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
        .map_or_else(|| ProgressEvent::Output(line.to_string()), ProgressEvent::Step)
}
