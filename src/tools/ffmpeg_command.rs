use crate::config::ToolSettings;
use crate::tools::ffprobe_info::FrameRate;
use anyhow::{Context, Result, bail};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

/// 影格序列的起始編號
const FIRST_FRAME: &str = "1";

pub enum FfmpegCommand<'a> {
    /// 影片 -> 影格序列
    ExtractFrames {
        input: &'a Path,
        output_pattern: &'a Path,
    },
    /// 影格序列 -> 影片
    Recombine {
        input_pattern: &'a Path,
        frame_rate: FrameRate,
        output: &'a Path,
    },
}

impl FfmpegCommand<'_> {
    #[must_use]
    pub fn build_command(&self, settings: &ToolSettings) -> Command {
        let mut cmd = Command::new(&settings.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);

        match self {
            Self::ExtractFrames {
                input,
                output_pattern,
            } => {
                cmd.arg("-i")
                    .arg(input)
                    .args(["-start_number", FIRST_FRAME])
                    .arg(output_pattern);
            }
            Self::Recombine {
                input_pattern,
                frame_rate,
                output,
            } => {
                cmd.args(["-framerate", &frame_rate.to_string()])
                    .args(["-start_number", FIRST_FRAME])
                    .arg("-i")
                    .arg(input_pattern)
                    // libx264 + yuv420p 需要偶數寬高
                    .args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"])
                    .args(["-c:v", &settings.video_codec])
                    .args(["-pix_fmt", &settings.pixel_format])
                    .arg(output);
            }
        }

        cmd
    }

    pub fn run(&self, settings: &ToolSettings) -> Result<()> {
        let mut command = self.build_command(settings);
        command.stdout(Stdio::null()).stderr(Stdio::piped());

        debug!("執行 {:?}", command);
        let output = command
            .output()
            .with_context(|| format!("無法執行 {}", settings.ffmpeg))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} 執行失敗 ({}): {}", settings.ffmpeg, output.status, stderr.trim());
        }

        Ok(())
    }
}
