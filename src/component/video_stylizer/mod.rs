//! 影片風格化元件
//!
//! 將影片拆成影格，逐張以外部工具風格化後再合成回影片

mod frame_plan;
mod main;
mod progress;
mod task_scheduler;

pub use frame_plan::{FrameWorkItem, plan_frames, schedule_parameter};
pub use main::{Job, JobState, JobSummary, VideoStylizer};
pub use progress::{NoopObserver, ProgressObserver, TerminalProgress};
pub use task_scheduler::{FrameProcessor, ProcessingSummary};
