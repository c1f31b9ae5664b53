use crate::tools::WorkDir;
use std::path::PathBuf;

/// 計算第 `index` 張影格（1 起算，共 `total` 張）的形狀數
///
/// `n(i) = floor((i - 1) / (N - 1) * (end - start) + start)`，以整數運算求得精確值，
/// 因此 `n(1) == start`、`n(N) == end`，且序列單調。只有一張影格時回傳 `start`。
#[must_use]
pub fn schedule_parameter(index: u64, total: u64, start: i64, end: i64) -> i64 {
    if total <= 1 {
        return start;
    }

    let step = i128::from(index.clamp(1, total) - 1);
    let span = i128::from(end) - i128::from(start);
    let offset = (step * span).div_euclid(i128::from(total - 1));

    // offset 介於 0 與 span 之間，結果必在 start..=end 範圍內
    (i128::from(start) + offset) as i64
}

/// 單張影格的工作項目；`destination` 存在即代表已完成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWorkItem {
    pub index: u64,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub partial: PathBuf,
    pub shapes: i64,
}

impl FrameWorkItem {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.destination.exists()
    }
}

#[must_use]
pub fn plan_frames(
    work_dir: &WorkDir,
    total_frames: u64,
    start: i64,
    end: i64,
) -> Vec<FrameWorkItem> {
    (1..=total_frames)
        .map(|index| FrameWorkItem {
            index,
            source: work_dir.frame_path(index),
            destination: work_dir.processed_path(index),
            partial: work_dir.partial_path(index),
            shapes: schedule_parameter(index, total_frames, start, end),
        })
        .collect()
}
