use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 起始與結束形狀數的預設值
pub const DEFAULT_SHAPES: i64 = 1000;

/// 風格化工具的輔助參數（`-m` 模式、`-r` 縮放解析度、`-s` 輸出尺寸）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StylizeOptions {
    pub mode: u32,
    pub resize: u32,
    pub size: u32,
}

impl Default for StylizeOptions {
    fn default() -> Self {
        Self {
            mode: 1,
            resize: 256,
            size: 1024,
        }
    }
}

impl fmt::Display for StylizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.mode, self.resize, self.size)
    }
}

/// 解析 `mode,resize,size` 格式
impl FromStr for StylizeOptions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [mode, resize, size] = parts.as_slice() else {
            return Err(format!(
                "格式應為 <mode>,<resize>,<size>（例如 1,256,1024），收到 `{s}`"
            ));
        };

        let parse = |name: &str, value: &str| {
            value
                .parse::<u32>()
                .map_err(|_| format!("`{s}` 中的 {name} 無效: `{value}`"))
        };

        Ok(Self {
            mode: parse("mode", *mode)?,
            resize: parse("resize", *resize)?,
            size: parse("size", *size)?,
        })
    }
}

/// 外部工具設定，可由 JSON 設定檔覆寫
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub primitive: String,
    pub video_codec: String,
    pub pixel_format: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            primitive: "primitive".to_string(),
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

/// 單次工作的完整設定；建立後不再變動，以參考傳遞給各元件
#[derive(Debug, Clone, Serialize)]
pub struct JobConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start: i64,
    pub end: i64,
    pub options: StylizeOptions,
    pub workers: usize,
    pub scratch_root: PathBuf,
    pub debug: bool,
    pub tools: ToolSettings,
}

impl JobConfig {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            start: DEFAULT_SHAPES,
            end: DEFAULT_SHAPES,
            options: StylizeOptions::default(),
            workers: 1,
            scratch_root: std::env::temp_dir(),
            debug: false,
            tools: ToolSettings::default(),
        }
    }
}
