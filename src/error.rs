use crate::component::video_stylizer::JobState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("請指定要處理的影片 (--input)")]
    MissingInput,
    #[error("請指定輸出路徑 (--output)")]
    MissingOutput,
    #[error("worker 數量至少為 1")]
    NoWorkers,
    #[error("無法載入工具設定: {0:#}")]
    Settings(anyhow::Error),
}

/// 工作失敗的分類；全部都會中止本次執行
#[derive(Debug, Error)]
pub enum JobError {
    #[error("設定錯誤: {0}")]
    Config(#[from] ConfigError),

    #[error("{stage} 階段檔案操作失敗: {reason:#}")]
    Io {
        stage: JobState,
        reason: anyhow::Error,
    },

    #[error("{stage} 階段失敗: {reason:#}")]
    Tool {
        stage: JobState,
        reason: anyhow::Error,
    },

    #[error("處理第 {index} 張影格失敗: {reason:#}")]
    Frame { index: u64, reason: anyhow::Error },

    #[error("無法處理的輸入: {0}")]
    Degenerate(String),

    #[error("於 {stage} 階段中斷；以相同輸入再次執行即可續跑")]
    Interrupted { stage: JobState },
}

impl JobError {
    #[must_use]
    pub fn io(stage: JobState) -> impl FnOnce(anyhow::Error) -> Self {
        move |reason| Self::Io { stage, reason }
    }

    /// 建議的行程結束碼
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Interrupted { .. } => 130,
            _ => 1,
        }
    }
}
