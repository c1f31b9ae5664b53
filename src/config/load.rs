use crate::cli::Cli;
use crate::config::types::{JobConfig, ToolSettings};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::Path;

/// 未指定 `--settings` 時，從目前工作目錄讀取的設定檔
pub const DEFAULT_SETTINGS_FILE: &str = "video_stylizer.json";

impl JobConfig {
    /// 驗證命令列參數並建立工作設定；任何 I/O 之前就會回報缺少的路徑
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let input = cli.input.ok_or(ConfigError::MissingInput)?;
        let output = cli.output.ok_or(ConfigError::MissingOutput)?;
        if cli.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let tools = load_tool_settings(cli.settings.as_deref()).map_err(ConfigError::Settings)?;

        Ok(Self {
            input,
            output,
            start: cli.start,
            end: cli.end,
            options: cli.custom,
            workers: cli.workers,
            scratch_root: cli.scratch_dir.unwrap_or_else(std::env::temp_dir),
            debug: cli.debug,
            tools,
        })
    }
}

/// 讀取工具設定
///
/// 明確指定的設定檔必須存在且可解析；預設設定檔不存在時使用內建預設值。
pub fn load_tool_settings(path: Option<&Path>) -> Result<ToolSettings> {
    match path {
        Some(path) => read_settings(path),
        None => {
            let path = Path::new(DEFAULT_SETTINGS_FILE);
            if !path.exists() {
                return Ok(ToolSettings::default());
            }
            read_settings(path).or_else(|e| {
                warn!("忽略設定檔 {}: {e:#}", path.display());
                Ok(ToolSettings::default())
            })
        }
    }
}

fn read_settings(path: &Path) -> Result<ToolSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("無法讀取設定檔: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("無法解析設定檔: {}", path.display()))
}
