use super::frame_plan::FrameWorkItem;
use super::main::JobState;
use super::progress::ProgressObserver;
use crate::config::StylizeOptions;
use crate::error::JobError;
use crate::tools::{FrameStylizer, StylizeRequest, TaskHandle, TaskOutcome};
use anyhow::{Context, anyhow};
use crossbeam_channel::RecvTimeoutError;
use log::{debug, error, warn};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// 等待進度事件時檢查中斷信號的間隔
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 輸出關閉後輪詢任務結束狀態的間隔
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub processed: usize,
    pub skipped: usize,
}

/// 逐張執行風格化工具
///
/// `workers == 1` 時依編號順序一次處理一張；更多 worker 時以 rayon 執行緒池平行處理。
/// 任一張失敗即停止派發新的影格並回報錯誤。
pub struct FrameProcessor<'a> {
    stylizer: &'a dyn FrameStylizer,
    options: &'a StylizeOptions,
    observer: &'a dyn ProgressObserver,
    shutdown_signal: &'a AtomicBool,
    workers: usize,
}

impl<'a> FrameProcessor<'a> {
    pub const fn new(
        stylizer: &'a dyn FrameStylizer,
        options: &'a StylizeOptions,
        observer: &'a dyn ProgressObserver,
        shutdown_signal: &'a AtomicBool,
        workers: usize,
    ) -> Self {
        Self {
            stylizer,
            options,
            observer,
            shutdown_signal,
            workers,
        }
    }

    pub fn run(&self, items: &[FrameWorkItem]) -> Result<ProcessingSummary, JobError> {
        let (done, pending): (Vec<&FrameWorkItem>, Vec<&FrameWorkItem>) =
            items.iter().partition(|item| item.is_done());

        for item in &done {
            debug!("影格 {} 已處理，跳過", item.index);
            self.observer.frame_skipped(item);
        }
        self.observer.frames_planned(items.len() as u64, done.len() as u64);

        debug!(
            "待處理 {} 張影格（已完成 {} 張，{} 個 worker）",
            pending.len(),
            done.len(),
            self.workers
        );

        let aborted = AtomicBool::new(false);

        if self.workers <= 1 {
            for item in &pending {
                self.process_frame(item, &aborted)?;
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|e| JobError::Io {
                    stage: JobState::Processing,
                    reason: anyhow!(e).context("無法建立 worker 執行緒池"),
                })?;

            pool.install(|| {
                pending
                    .par_iter()
                    .try_for_each(|item| self.process_frame(item, &aborted))
            })?;
        }

        Ok(ProcessingSummary {
            processed: pending.len(),
            skipped: done.len(),
        })
    }

    fn process_frame(&self, item: &FrameWorkItem, aborted: &AtomicBool) -> Result<(), JobError> {
        // 其他 worker 已失敗，錯誤由該 worker 回報
        if aborted.load(Ordering::SeqCst) {
            return Ok(());
        }

        let result = self.stylize(item);
        if result.is_err() {
            aborted.store(true, Ordering::SeqCst);
        }
        result
    }

    fn stylize(&self, item: &FrameWorkItem) -> Result<(), JobError> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Err(interrupted());
        }
        if !item.source.exists() {
            return Err(frame_error(
                item,
                anyhow!("來源影格不存在: {}", item.source.display()),
            ));
        }

        // 前次中斷留下的暫存輸出
        remove_if_exists(&item.partial).map_err(|e| frame_error(item, e))?;

        self.observer.frame_started(item);
        debug!(
            "風格化影格 {}（n={}）: {} -> {}",
            item.index,
            item.shapes,
            item.source.display(),
            item.destination.display()
        );

        let request = StylizeRequest {
            source: &item.source,
            destination: &item.partial,
            shapes: item.shapes,
            options: self.options,
        };

        let task = match self.stylizer.spawn(&request) {
            Ok(task) => task,
            Err(e) => {
                self.observer.frame_finished(item, false);
                return Err(frame_error(item, e.context("無法啟動風格化工具")));
            }
        };

        let outcome = self.observe(item, task);
        let result = outcome.and_then(|outcome| self.complete(item, outcome));

        if result.is_err() {
            if let Err(e) = remove_if_exists(&item.partial) {
                warn!("{e:#}");
            }
        }
        self.observer.frame_finished(item, result.is_ok());
        result
    }

    /// 轉送進度事件直到任務結束；收到中斷信號時終止子程序
    ///
    /// 輸出關閉後子程序可能仍在執行，此時改為輪詢結束狀態，中斷信號依然有效。
    fn observe(&self, item: &FrameWorkItem, mut task: TaskHandle) -> Result<TaskOutcome, JobError> {
        loop {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("終止影格 {} 的處理", item.index);
                task.cancel();
                let _ = task.wait();
                return Err(interrupted());
            }

            match task.events().recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.observer.frame_progress(item, &event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if task.is_finished().map_err(|e| frame_error(item, e))? {
                        break;
                    }
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
            }
        }

        task.wait().map_err(|e| frame_error(item, e))
    }

    fn complete(&self, item: &FrameWorkItem, outcome: TaskOutcome) -> Result<(), JobError> {
        match outcome {
            TaskOutcome::Success => {
                if !item.partial.exists() {
                    return Err(frame_error(
                        item,
                        anyhow!("風格化工具已結束，但沒有產生輸出"),
                    ));
                }
                fs::rename(&item.partial, &item.destination)
                    .with_context(|| {
                        format!(
                            "無法移動 {} -> {}",
                            item.partial.display(),
                            item.destination.display()
                        )
                    })
                    .map_err(|e| frame_error(item, e))?;

                debug!("影格 {} 完成: {}", item.index, item.destination.display());
                Ok(())
            }
            TaskOutcome::Failed { code, message } => {
                // 子程序因 Ctrl-C 一併結束時，視為中斷而非失敗
                if self.shutdown_signal.load(Ordering::SeqCst) {
                    return Err(interrupted());
                }

                let status = code.map_or_else(
                    || "無結束碼".to_string(),
                    |c| format!("結束碼 {c}"),
                );
                error!("影格 {} 處理失敗 ({status}): {message}", item.index);
                Err(frame_error(
                    item,
                    anyhow!("風格化工具執行失敗 ({status}): {message}"),
                ))
            }
        }
    }
}

fn frame_error(item: &FrameWorkItem, reason: anyhow::Error) -> JobError {
    JobError::Frame {
        index: item.index,
        reason,
    }
}

const fn interrupted() -> JobError {
    JobError::Interrupted {
        stage: JobState::Processing,
    }
}

fn remove_if_exists(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("無法刪除未完成的輸出: {}", path.display()))?;
    }
    Ok(())
}
