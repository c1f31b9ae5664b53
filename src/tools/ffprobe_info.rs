use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// 以最簡分數表示的幀率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    #[must_use]
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let divisor = gcd(num, den);
        Some(Self {
            num: num / divisor,
            den: den / divisor,
        })
    }

    #[must_use]
    pub const fn num(&self) -> u32 {
        self.num
    }

    #[must_use]
    pub const fn den(&self) -> u32 {
        self.den
    }

    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaInfo {
    pub total_frames: u64,
    pub frame_rate: FrameRate,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    nb_read_frames: Option<String>,
}

/// 從 ffprobe 的 JSON 輸出解析出的視訊串流資訊；影格數可能缺漏
#[derive(Debug, PartialEq, Eq)]
struct ProbedStream {
    frame_count: Option<u64>,
    frame_rate: FrameRate,
}

/// 使用 ffprobe 取得影格數與幀率
///
/// 容器未標示 `nb_frames` 時，改以 `-count_frames` 實際解碼計數。
pub fn get_media_info(ffprobe: &str, path: &Path) -> Result<MediaInfo> {
    let stdout = run_ffprobe(ffprobe, path, &["-show_format", "-show_streams"])?;
    let stream = parse_probe_output(&stdout)?;

    let total_frames = match stream.frame_count {
        Some(count) => count,
        None => count_frames(ffprobe, path)?,
    };

    Ok(MediaInfo {
        total_frames,
        frame_rate: stream.frame_rate,
    })
}

fn count_frames(ffprobe: &str, path: &Path) -> Result<u64> {
    let stdout = run_ffprobe(
        ffprobe,
        path,
        &[
            "-count_frames",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_type,nb_read_frames",
        ],
    )?;

    parse_frame_count(&stdout).with_context(|| format!("無法計算影格數: {}", path.display()))
}

fn run_ffprobe(ffprobe: &str, path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json"])
        .args(args)
        .arg(path)
        .output()
        .with_context(|| format!("無法執行 {ffprobe}: {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{ffprobe} 讀取失敗 {}: {}", path.display(), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_probe_output(json: &str) -> Result<ProbedStream> {
    let probe: FfprobeOutput = serde_json::from_str(json).context("無法解析 ffprobe 輸出")?;

    // 找到視訊串流
    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| anyhow!("找不到視訊串流"))?;

    // r_frame_rate 為 0/0 時退回 avg_frame_rate
    let frame_rate = [&video_stream.r_frame_rate, &video_stream.avg_frame_rate]
        .into_iter()
        .filter_map(|r| r.as_deref())
        .find_map(parse_frame_rate)
        .ok_or_else(|| anyhow!("無法判斷幀率"))?;

    let frame_count = video_stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok());

    Ok(ProbedStream {
        frame_count,
        frame_rate,
    })
}

/// 解析 `-count_frames` 探測輸出中的 `nb_read_frames`
fn parse_frame_count(json: &str) -> Result<u64> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).context("無法解析 ffprobe 影格計數輸出")?;

    probe
        .streams
        .as_ref()
        .and_then(|streams| streams.first())
        .and_then(|s| s.nb_read_frames.as_deref())
        .and_then(|n| n.trim().parse::<u64>().ok())
        .ok_or_else(|| anyhow!("ffprobe 沒有回報影格數"))
}

/// 解析幀率字串（例如 "30/1"、"30000/1001" 或 "29.97"）
fn parse_frame_rate(rate: &str) -> Option<FrameRate> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: u32 = num_str.trim().parse().ok()?;
        let den: u32 = den_str.trim().parse().ok()?;
        return FrameRate::new(num, den);
    }

    let value: f64 = rate.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let scaled = (value * 1000.0).round();
    if scaled > f64::from(u32::MAX) {
        return None;
    }
    FrameRate::new(scaled as u32, 1000)
}
