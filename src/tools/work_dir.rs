//! 工作暫存資料夾
//!
//! 每個工作以內容雜湊命名一個資料夾，所有影格與處理結果都放在其中：
//!
//! ```text
//! <root>/video_stylizer-<digest>/
//!     frame_0001.png        擷取出的原始影格
//!     processed_0001.png    風格化完成的影格（存在即代表完成）
//!     partial_0001.png      風格化進行中的暫存輸出
//!     .extracting/          擷取中的影格
//! ```

use crate::tools::ensure_directory_exists;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

pub const SCRATCH_PREFIX: &str = "video_stylizer";

const FRAME_PREFIX: &str = "frame_";
const PROCESSED_PREFIX: &str = "processed_";
const PARTIAL_PREFIX: &str = "partial_";
const FRAME_EXTENSION: &str = ".png";
const STAGING_DIR: &str = ".extracting";

#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    #[must_use]
    pub fn path_for(scratch_root: &Path, digest: &str) -> PathBuf {
        scratch_root.join(format!("{SCRATCH_PREFIX}-{digest}"))
    }

    /// 取得（必要時建立）工作資料夾；同一份輸入永遠對應同一個資料夾
    pub fn prepare(scratch_root: &Path, digest: &str) -> Result<Self> {
        let root = Self::path_for(scratch_root, digest);
        ensure_directory_exists(&root)?;
        debug!("暫存資料夾: {}", root.display());
        Ok(Self { root })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.root.join(indexed_name(FRAME_PREFIX, index))
    }

    #[must_use]
    pub fn processed_path(&self, index: u64) -> PathBuf {
        self.root.join(indexed_name(PROCESSED_PREFIX, index))
    }

    #[must_use]
    pub fn partial_path(&self, index: u64) -> PathBuf {
        self.root.join(indexed_name(PARTIAL_PREFIX, index))
    }

    /// ffmpeg 影格序列樣式，與 [`Self::frame_path`] 的命名一致
    #[must_use]
    pub fn frame_pattern_in(directory: &Path) -> PathBuf {
        directory.join(sequence_pattern(FRAME_PREFIX))
    }

    #[must_use]
    pub fn processed_pattern(&self) -> PathBuf {
        self.root.join(sequence_pattern(PROCESSED_PREFIX))
    }

    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// 第一張影格只會在擷取全部完成後才出現，見 [`Self::promote_staged_frames`]
    #[must_use]
    pub fn has_extracted_frames(&self) -> bool {
        self.frame_path(1).exists()
    }

    /// 清空並重建擷取用的暫存資料夾
    pub fn reset_staging(&self) -> Result<PathBuf> {
        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("無法清空擷取暫存資料夾: {}", staging.display()))?;
        }
        ensure_directory_exists(&staging)?;
        Ok(staging)
    }

    /// 將擷取完成的影格移入工作資料夾
    ///
    /// 依編號由大到小搬移，`frame_0001` 最後出現。
    pub fn promote_staged_frames(&self) -> Result<usize> {
        let staging = self.staging_dir();
        let mut staged = frame_indices_in(&staging)?;
        staged.sort_unstable_by(|a, b| b.cmp(a));

        for index in &staged {
            let from = staging.join(indexed_name(FRAME_PREFIX, *index));
            let to = self.frame_path(*index);
            fs::rename(&from, &to)
                .with_context(|| format!("無法移動影格 {} -> {}", from.display(), to.display()))?;
        }

        fs::remove_dir_all(&staging)
            .with_context(|| format!("無法刪除擷取暫存資料夾: {}", staging.display()))?;

        Ok(staged.len())
    }

    pub fn count_extracted_frames(&self) -> Result<u64> {
        Ok(frame_indices_in(&self.root)?.len() as u64)
    }
}

fn indexed_name(prefix: &str, index: u64) -> String {
    format!("{prefix}{index:04}{FRAME_EXTENSION}")
}

fn sequence_pattern(prefix: &str) -> String {
    format!("{prefix}%04d{FRAME_EXTENSION}")
}

fn parse_frame_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_EXTENSION)?
        .parse()
        .ok()
}

fn frame_indices_in(directory: &Path) -> Result<Vec<u64>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("無法讀取資料夾: {}", directory.display()))?;

    Ok(entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| e.file_name().to_str().and_then(parse_frame_index))
        .collect())
}
