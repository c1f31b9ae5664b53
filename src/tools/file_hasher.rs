use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// 工作識別碼長度（十六進位字元）
///
/// 完整 BLAKE3 雜湊截斷為 8 個字元（32 bits）。單機批次工作的碰撞機率可忽略，
/// 代價是不同內容理論上可能共用同一個暫存資料夾。
pub const JOB_DIGEST_LEN: usize = 8;

/// 以固定大小緩衝區串流計算雜湊，記憶體用量與輸入大小無關
pub fn hash_reader<R: Read>(reader: R) -> std::io::Result<String> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

pub fn calculate_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("無法開啟檔案: {}", path.display()))?;
    hash_reader(file).with_context(|| format!("無法讀取檔案: {}", path.display()))
}

/// 由輸入內容產生工作識別碼（與路徑、檔案中繼資料無關）
pub fn job_digest(path: &Path) -> Result<String> {
    let mut digest = calculate_file_hash(path)?;
    digest.truncate(JOB_DIGEST_LEN);
    Ok(digest)
}
