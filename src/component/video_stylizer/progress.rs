use super::frame_plan::FrameWorkItem;
use super::main::JobState;
use crate::tools::ProgressEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

/// 工作進度的觀察者；所有方法預設為空操作
///
/// 多個 worker 會同時呼叫，實作須為 `Sync`。
pub trait ProgressObserver: Sync {
    fn stage_changed(&self, _state: JobState) {}

    fn frames_planned(&self, _total: u64, _completed: u64) {}

    fn frame_skipped(&self, _item: &FrameWorkItem) {}

    fn frame_started(&self, _item: &FrameWorkItem) {}

    fn frame_progress(&self, _item: &FrameWorkItem, _event: &ProgressEvent) {}

    fn frame_finished(&self, _item: &FrameWorkItem, _success: bool) {}
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// 終端機進度條：一條總進度，加上每張處理中影格各一條
pub struct TerminalProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    frames: Mutex<HashMap<u64, ProgressBar>>,
}

impl TerminalProgress {
    #[must_use]
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} 張影格 ({eta}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );

        Self {
            multi,
            overall,
            frames: Mutex::new(HashMap::new()),
        }
    }

    pub fn finish(&self) {
        self.overall.finish_and_clear();
    }

    fn frame_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("  {prefix} [{bar:30.green/white}] {percent:>3}%")
            .expect("Invalid progress bar template")
            .progress_chars("= ")
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TerminalProgress {
    fn stage_changed(&self, state: JobState) {
        self.overall.set_message(state.to_string());
    }

    fn frames_planned(&self, total: u64, completed: u64) {
        self.overall.set_length(total);
        self.overall.set_position(completed);
    }

    fn frame_started(&self, item: &FrameWorkItem) {
        let bar = self
            .multi
            .add(ProgressBar::new(u64::try_from(item.shapes).unwrap_or(0)));
        bar.set_style(Self::frame_style());
        bar.set_prefix(format!("處理影格 {}", item.index));

        if let Ok(mut frames) = self.frames.lock() {
            frames.insert(item.index, bar);
        }
    }

    fn frame_progress(&self, item: &FrameWorkItem, event: &ProgressEvent) {
        let ProgressEvent::Step(step) = event else {
            return;
        };
        if let Ok(frames) = self.frames.lock() {
            if let Some(bar) = frames.get(&item.index) {
                bar.set_position(*step);
            }
        }
    }

    fn frame_finished(&self, item: &FrameWorkItem, success: bool) {
        let bar = self
            .frames
            .lock()
            .ok()
            .and_then(|mut frames| frames.remove(&item.index));

        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        if success {
            self.overall.inc(1);
        }
    }
}
