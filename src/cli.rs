use crate::config::{DEFAULT_SHAPES, StylizeOptions};
use clap::Parser;
use std::path::PathBuf;

/// 將影片拆成影格逐張風格化，再合成回影片
///
/// 中斷的工作以相同輸入再次執行時，會從中斷處繼續。
#[derive(Parser, Debug)]
#[command(name = "video_stylizer", version)]
pub struct Cli {
    /// 輸入影片
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 輸出影片（已存在時覆寫）
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 第一張影格的形狀數
    #[arg(
        short,
        long,
        visible_alias = "begin",
        short_alias = 'b',
        default_value_t = DEFAULT_SHAPES,
        allow_negative_numbers = true
    )]
    pub start: i64,

    /// 最後一張影格的形狀數
    #[arg(short, long, default_value_t = DEFAULT_SHAPES, allow_negative_numbers = true)]
    pub end: i64,

    /// 風格化工具的輔助參數: <mode>,<resize>,<size>
    #[arg(short, long, default_value = "1,256,1024")]
    pub custom: StylizeOptions,

    /// 同時處理的影格數
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// 各工作暫存資料夾的上層目錄（預設為系統暫存目錄）
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// 覆寫外部工具設定的 JSON 檔
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// 顯示解析後的設定並開啟除錯日誌
    #[arg(short, long)]
    pub debug: bool,
}
