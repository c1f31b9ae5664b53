use super::frame_plan::plan_frames;
use super::progress::ProgressObserver;
use super::task_scheduler::{FrameProcessor, ProcessingSummary};
use crate::config::JobConfig;
use crate::error::JobError;
use crate::tools::{
    FrameRate, FrameStylizer, MediaTools, WorkDir, job_digest, validate_file_exists,
};
use log::{debug, error, warn};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 工作狀態；依序前進，任一階段失敗即進入 `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Pending,
    Hashing,
    Probing,
    Extracting,
    Processing,
    Recombining,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Hashing => "hashing",
            Self::Probing => "probing",
            Self::Extracting => "extracting",
            Self::Processing => "processing",
            Self::Recombining => "recombining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 探測完成後確定的工作內容
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub digest: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub total_frames: u64,
    pub frame_rate: FrameRate,
    pub scratch_dir: PathBuf,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job: Job,
    /// 本次是否實際執行了影格擷取
    pub extracted: bool,
    pub frames: ProcessingSummary,
}

/// 影片風格化流程：雜湊 → 探測 → 擷取 → 逐張處理 → 合成
///
/// 暫存資料夾在失敗或中斷時保留，相同輸入再次執行會跳過已完成的影格。
pub struct VideoStylizer<'a> {
    config: &'a JobConfig,
    media: &'a dyn MediaTools,
    stylizer: &'a dyn FrameStylizer,
    observer: &'a dyn ProgressObserver,
    shutdown_signal: Arc<AtomicBool>,
    state: Cell<JobState>,
}

impl<'a> VideoStylizer<'a> {
    pub const fn new(
        config: &'a JobConfig,
        media: &'a dyn MediaTools,
        stylizer: &'a dyn FrameStylizer,
        observer: &'a dyn ProgressObserver,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            media,
            stylizer,
            observer,
            shutdown_signal,
            state: Cell::new(JobState::Pending),
        }
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.state.get()
    }

    pub fn run(&self) -> Result<JobSummary, JobError> {
        let result = self.run_stages();

        match &result {
            Ok(summary) => {
                self.transition(JobState::Done);
                debug!(
                    "工作 {} 完成: 處理 {} 張影格，續用 {} 張",
                    summary.job.digest, summary.frames.processed, summary.frames.skipped
                );
            }
            Err(e) => {
                error!("工作於 {} 階段失敗: {e}", self.state());
                self.transition(JobState::Failed);
            }
        }

        result
    }

    fn run_stages(&self) -> Result<JobSummary, JobError> {
        let config = self.config;

        self.transition(JobState::Hashing);
        validate_file_exists(&config.input).map_err(JobError::io(JobState::Hashing))?;
        let digest = job_digest(&config.input).map_err(JobError::io(JobState::Hashing))?;
        let work_dir = WorkDir::prepare(&config.scratch_root, &digest)
            .map_err(JobError::io(JobState::Hashing))?;
        self.check_shutdown()?;

        self.transition(JobState::Probing);
        let info = self
            .media
            .probe(&config.input)
            .map_err(|e| self.tool_error(e))?;
        if info.total_frames == 0 {
            return Err(JobError::Degenerate(format!(
                "{} 的影格數為 0",
                config.input.display()
            )));
        }
        debug!(
            "處理檔案: {} ({digest}) [{} 張影格 @ {} fps]",
            display_name(&config.input),
            info.total_frames,
            info.frame_rate
        );
        self.check_shutdown()?;

        self.transition(JobState::Extracting);
        let extracted = self.extract_frames(&work_dir)?;
        let total_frames = self.reconcile_frame_count(&work_dir, info.total_frames)?;

        self.transition(JobState::Processing);
        let items = plan_frames(&work_dir, total_frames, config.start, config.end);
        let frames = FrameProcessor::new(
            self.stylizer,
            &config.options,
            self.observer,
            &self.shutdown_signal,
            config.workers,
        )
        .run(&items)?;
        self.check_shutdown()?;

        self.transition(JobState::Recombining);
        self.media
            .recombine(&work_dir.processed_pattern(), info.frame_rate, &config.output)
            .map_err(|e| self.tool_error(e))?;

        Ok(JobSummary {
            job: Job {
                digest,
                input: config.input.clone(),
                output: config.output.clone(),
                total_frames,
                frame_rate: info.frame_rate,
                scratch_dir: work_dir.path().to_path_buf(),
                start: config.start,
                end: config.end,
            },
            extracted,
            frames,
        })
    }

    /// 擷取影格到暫存資料夾；第一張影格已存在時跳過
    fn extract_frames(&self, work_dir: &WorkDir) -> Result<bool, JobError> {
        if work_dir.has_extracted_frames() {
            debug!("影格已擷取，跳過擷取");
            return Ok(false);
        }

        debug!("擷取影格中...");
        let staging = work_dir
            .reset_staging()
            .map_err(JobError::io(JobState::Extracting))?;
        self.media
            .extract_frames(&self.config.input, &WorkDir::frame_pattern_in(&staging))
            .map_err(|e| self.tool_error(e))?;
        self.check_shutdown()?;

        let moved = work_dir
            .promote_staged_frames()
            .map_err(JobError::io(JobState::Extracting))?;
        debug!("已擷取 {moved} 張影格到 {}", work_dir.path().display());

        Ok(true)
    }

    /// 以磁碟上實際的影格數為準；與探測結果不符時發出警告
    fn reconcile_frame_count(&self, work_dir: &WorkDir, probed: u64) -> Result<u64, JobError> {
        let extracted = work_dir
            .count_extracted_frames()
            .map_err(JobError::io(JobState::Extracting))?;

        if extracted == 0 {
            return Err(JobError::Degenerate(
                "影格擷取沒有產生任何影格".to_string(),
            ));
        }
        if extracted != probed {
            warn!("探測回報 {probed} 張影格，實際擷取 {extracted} 張；以 {extracted} 張為準");
        }

        Ok(extracted)
    }

    fn transition(&self, state: JobState) {
        debug!("工作狀態: {} -> {state}", self.state());
        self.state.set(state);
        self.observer.stage_changed(state);
    }

    fn check_shutdown(&self) -> Result<(), JobError> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Err(JobError::Interrupted {
                stage: self.state(),
            });
        }
        Ok(())
    }

    /// 外部工具失敗；若已收到中斷信號則歸類為中斷
    fn tool_error(&self, reason: anyhow::Error) -> JobError {
        let stage = self.state();
        if self.shutdown_signal.load(Ordering::SeqCst) {
            JobError::Interrupted { stage }
        } else {
            JobError::Tool { stage, reason }
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}
