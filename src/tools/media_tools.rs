//! 外部工具介面
//!
//! 流程只透過這些 trait 呼叫外部工具，測試時可替換成行程內的實作。

use crate::config::{StylizeOptions, ToolSettings};
use crate::tools::ffmpeg_command::FfmpegCommand;
use crate::tools::ffprobe_info::{FrameRate, MediaInfo, get_media_info};
use crate::tools::task_handle::TaskHandle;
use anyhow::Result;
use std::path::Path;

/// 影片探測、拆解與合成
pub trait MediaTools: Sync {
    fn probe(&self, input: &Path) -> Result<MediaInfo>;

    /// 將影片拆成 `output_pattern`（ffmpeg 序列樣式，從 1 起算）指定的影格
    fn extract_frames(&self, input: &Path, output_pattern: &Path) -> Result<()>;

    /// 以 `frame_rate` 將影格序列合成為影片，覆寫既有輸出
    fn recombine(&self, input_pattern: &Path, frame_rate: FrameRate, output: &Path)
    -> Result<()>;
}

pub struct StylizeRequest<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    pub shapes: i64,
    pub options: &'a StylizeOptions,
}

/// 單張影格的風格化工具
pub trait FrameStylizer: Sync {
    fn spawn(&self, request: &StylizeRequest<'_>) -> Result<TaskHandle>;
}

pub struct FfmpegTools {
    settings: ToolSettings,
}

impl FfmpegTools {
    #[must_use]
    pub const fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

impl MediaTools for FfmpegTools {
    fn probe(&self, input: &Path) -> Result<MediaInfo> {
        get_media_info(&self.settings.ffprobe, input)
    }

    fn extract_frames(&self, input: &Path, output_pattern: &Path) -> Result<()> {
        FfmpegCommand::ExtractFrames {
            input,
            output_pattern,
        }
        .run(&self.settings)
    }

    fn recombine(
        &self,
        input_pattern: &Path,
        frame_rate: FrameRate,
        output: &Path,
    ) -> Result<()> {
        FfmpegCommand::Recombine {
            input_pattern,
            frame_rate,
            output,
        }
        .run(&self.settings)
    }
}
