//! 流程整合測試
//!
//! 以行程內的假工具取代 ffmpeg / primitive，驗證階段順序與續跑行為。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tempfile::TempDir;
use video_stylizer::component::video_stylizer::{JobState, NoopObserver, VideoStylizer};
use video_stylizer::config::JobConfig;
use video_stylizer::error::JobError;
use video_stylizer::tools::{
    FrameRate, FrameStylizer, MediaInfo, MediaTools, ProgressEvent, StylizeRequest, TaskHandle,
    WorkDir, job_digest, parse_progress_line,
};

struct FakeMedia {
    info: MediaInfo,
    /// 實際擷取的影格數；None 表示與探測結果相同
    extract_count: Option<u64>,
    probe_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    recombined: Mutex<Vec<(PathBuf, FrameRate, PathBuf)>>,
}

impl FakeMedia {
    fn new(total_frames: u64) -> Self {
        Self {
            info: MediaInfo {
                total_frames,
                frame_rate: FrameRate::new(24, 1).unwrap(),
            },
            extract_count: None,
            probe_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            recombined: Mutex::new(Vec::new()),
        }
    }

    fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    fn recombine_calls(&self) -> usize {
        self.recombined.lock().unwrap().len()
    }
}

impl MediaTools for FakeMedia {
    fn probe(&self, _input: &Path) -> Result<MediaInfo> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.info)
    }

    fn extract_frames(&self, _input: &Path, output_pattern: &Path) -> Result<()> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let pattern = output_pattern.to_string_lossy().into_owned();
        for index in 1..=self.extract_count.unwrap_or(self.info.total_frames) {
            fs::write(pattern.replace("%04d", &format!("{index:04}")), b"raw frame")?;
        }
        Ok(())
    }

    fn recombine(&self, input_pattern: &Path, frame_rate: FrameRate, output: &Path) -> Result<()> {
        self.recombined.lock().unwrap().push((
            input_pattern.to_path_buf(),
            frame_rate,
            output.to_path_buf(),
        ));
        fs::write(output, b"video")?;
        Ok(())
    }
}

#[derive(Default)]
struct FakeStylizer {
    /// (來源影格, 形狀數)
    calls: Mutex<Vec<(PathBuf, i64)>>,
    fail_source: Option<String>,
    /// 寫出半成品後一直等到被取消
    hang_source: Option<String>,
    /// 成功影格的處理時間
    delay: Duration,
}

impl FakeStylizer {
    fn failing_on(file_name: &str) -> Self {
        Self {
            fail_source: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    fn hanging_on(file_name: &str) -> Self {
        Self {
            hang_source: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(PathBuf, i64)> {
        self.calls.lock().unwrap().clone()
    }

    fn sources(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|(source, _)| source.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl FrameStylizer for FakeStylizer {
    fn spawn(&self, request: &StylizeRequest<'_>) -> Result<TaskHandle> {
        self.calls
            .lock()
            .unwrap()
            .push((request.source.to_path_buf(), request.shapes));

        let destination = request.destination.to_path_buf();
        let matches = |target: &Option<String>| {
            target.as_deref().is_some_and(|name| {
                request.source.file_name().is_some_and(|f| f == name)
            })
        };
        let fail = matches(&self.fail_source);
        let hang = matches(&self.hang_source);
        let delay = self.delay;

        Ok(TaskHandle::spawn_fn(move |events, cancelled| {
            events.send(ProgressEvent::Step(1))?;
            // 失敗前先留下半成品，驗證流程會清掉它
            fs::write(&destination, b"half written")?;
            if hang {
                while !cancelled.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(5));
                }
                bail!("killed");
            }
            if fail {
                bail!("stylizer crashed");
            }
            thread::sleep(delay);
            events.send(ProgressEvent::Step(2))?;
            fs::write(&destination, b"styled")?;
            Ok(())
        }))
    }
}

struct Fixture {
    _dir: TempDir,
    config: JobConfig,
}

impl Fixture {
    fn new(content: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        fs::write(&input, content).unwrap();

        let mut config = JobConfig::new(input, dir.path().join("output.mp4"));
        config.scratch_root = dir.path().join("scratch");
        Self { _dir: dir, config }
    }

    fn work_dir(&self) -> WorkDir {
        let digest = job_digest(&self.config.input).unwrap();
        WorkDir::prepare(&self.config.scratch_root, &digest).unwrap()
    }

    fn run(&self, media: &FakeMedia, stylizer: &FakeStylizer) -> Result<(), JobError> {
        self.run_with_signal(media, stylizer, Arc::new(AtomicBool::new(false)))
    }

    fn run_with_signal(
        &self,
        media: &FakeMedia,
        stylizer: &dyn FrameStylizer,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Result<(), JobError> {
        let pipeline =
            VideoStylizer::new(&self.config, media, stylizer, &NoopObserver, shutdown_signal);
        let result = pipeline.run().map(|_| ());
        let expected = if result.is_ok() { JobState::Done } else { JobState::Failed };
        assert_eq!(pipeline.state(), expected);
        result
    }
}

#[test]
fn test_fresh_run_processes_every_frame() {
    let fixture = Fixture::new(b"fresh video");
    let media = FakeMedia::new(4);
    let stylizer = FakeStylizer::default();

    fixture.run(&media, &stylizer).unwrap();

    assert_eq!(media.extract_calls(), 1);
    assert_eq!(
        stylizer.sources(),
        ["frame_0001.png", "frame_0002.png", "frame_0003.png", "frame_0004.png"]
    );

    let work_dir = fixture.work_dir();
    for index in 1..=4 {
        assert_eq!(fs::read(work_dir.processed_path(index)).unwrap(), b"styled");
        assert!(!work_dir.partial_path(index).exists());
    }
    assert!(!work_dir.staging_dir().exists());

    let recombined = media.recombined.lock().unwrap();
    assert_eq!(recombined.len(), 1);
    assert_eq!(recombined[0].0, work_dir.processed_pattern());
    assert_eq!(recombined[0].1, FrameRate::new(24, 1).unwrap());
    assert_eq!(recombined[0].2, fixture.config.output);
}

#[test]
fn test_shapes_follow_linear_schedule() {
    let mut fixture = Fixture::new(b"schedule");
    fixture.config.start = 100;
    fixture.config.end = 1000;
    let media = FakeMedia::new(10);
    let stylizer = FakeStylizer::default();

    fixture.run(&media, &stylizer).unwrap();

    let shapes: Vec<i64> = stylizer.calls().iter().map(|(_, n)| *n).collect();
    assert_eq!(shapes, [100, 200, 300, 400, 500, 600, 700, 800, 900, 1000]);
}

#[test]
fn test_complete_scratch_dir_skips_all_work() {
    let fixture = Fixture::new(b"resume me");
    fixture.run(&FakeMedia::new(5), &FakeStylizer::default()).unwrap();

    let media = FakeMedia::new(5);
    let stylizer = FakeStylizer::default();
    fixture.run(&media, &stylizer).unwrap();

    assert_eq!(media.extract_calls(), 0);
    assert!(stylizer.calls().is_empty());
    assert_eq!(media.recombine_calls(), 1);
}

#[test]
fn test_missing_processed_frame_is_redone_alone() {
    let fixture = Fixture::new(b"one missing");
    fixture.run(&FakeMedia::new(5), &FakeStylizer::default()).unwrap();
    fs::remove_file(fixture.work_dir().processed_path(3)).unwrap();

    let media = FakeMedia::new(5);
    let stylizer = FakeStylizer::default();
    fixture.run(&media, &stylizer).unwrap();

    assert_eq!(media.extract_calls(), 0);
    assert_eq!(stylizer.sources(), ["frame_0003.png"]);
    assert_eq!(media.recombine_calls(), 1);
}

#[test]
fn test_zero_frames_is_degenerate() {
    let fixture = Fixture::new(b"empty");
    let media = FakeMedia::new(0);
    let stylizer = FakeStylizer::default();

    let err = fixture.run(&media, &stylizer).unwrap_err();

    assert!(matches!(err, JobError::Degenerate(_)));
    assert_eq!(media.extract_calls(), 0);
    assert!(stylizer.calls().is_empty());
    assert_eq!(media.recombine_calls(), 0);
}

#[test]
fn test_single_frame_uses_start_value() {
    let mut fixture = Fixture::new(b"still");
    fixture.config.start = 42;
    fixture.config.end = 900;
    let media = FakeMedia::new(1);
    let stylizer = FakeStylizer::default();

    fixture.run(&media, &stylizer).unwrap();

    assert_eq!(stylizer.calls()[0].1, 42);
    assert_eq!(media.recombine_calls(), 1);
}

#[test]
fn test_frame_failure_aborts_and_keeps_completed_frames() {
    let fixture = Fixture::new(b"fails midway");
    let media = FakeMedia::new(5);
    let stylizer = FakeStylizer::failing_on("frame_0003.png");

    let err = fixture.run(&media, &stylizer).unwrap_err();

    assert!(matches!(err, JobError::Frame { index: 3, .. }));
    assert_eq!(stylizer.calls().len(), 3);
    assert_eq!(media.recombine_calls(), 0);

    let work_dir = fixture.work_dir();
    assert!(work_dir.processed_path(1).exists());
    assert!(work_dir.processed_path(2).exists());
    assert!(!work_dir.processed_path(3).exists());
    assert!(!work_dir.partial_path(3).exists());

    // 修好工具後續跑，只處理剩下的影格
    let media = FakeMedia::new(5);
    let stylizer = FakeStylizer::default();
    fixture.run(&media, &stylizer).unwrap();
    assert_eq!(
        stylizer.sources(),
        ["frame_0003.png", "frame_0004.png", "frame_0005.png"]
    );
}

#[test]
fn test_parallel_workers_process_every_frame() {
    let mut fixture = Fixture::new(b"parallel");
    fixture.config.workers = 3;
    let media = FakeMedia::new(12);
    let stylizer = FakeStylizer::default();

    fixture.run(&media, &stylizer).unwrap();

    let mut sources = stylizer.sources();
    sources.sort();
    assert_eq!(sources.len(), 12);
    sources.dedup();
    assert_eq!(sources.len(), 12);
    assert!((1..=12).all(|i| fixture.work_dir().processed_path(i).exists()));
}

#[test]
fn test_missing_input_fails_before_probing() {
    let mut fixture = Fixture::new(b"unused");
    fixture.config.input = fixture.config.scratch_root.join("does-not-exist.mp4");
    let media = FakeMedia::new(3);
    let stylizer = FakeStylizer::default();

    let err = fixture.run(&media, &stylizer).unwrap_err();

    assert!(matches!(
        err,
        JobError::Io {
            stage: JobState::Hashing,
            ..
        }
    ));
    assert_eq!(media.probe_calls.load(Ordering::SeqCst), 0);
    assert_eq!(media.extract_calls(), 0);
}

#[test]
fn test_interrupt_before_work_leaves_job_resumable() {
    let fixture = Fixture::new(b"interrupted");
    let media = FakeMedia::new(3);
    let stylizer = FakeStylizer::default();

    let err = fixture
        .run_with_signal(&media, &stylizer, Arc::new(AtomicBool::new(true)))
        .unwrap_err();

    assert!(matches!(err, JobError::Interrupted { .. }));
    assert_eq!(media.probe_calls.load(Ordering::SeqCst), 0);
    assert!(stylizer.calls().is_empty());
    assert!(fixture.work_dir().path().is_dir());
}

#[test]
fn test_identical_content_shares_scratch_dir() {
    let fixture = Fixture::new(b"same bytes");
    fixture.run(&FakeMedia::new(2), &FakeStylizer::default()).unwrap();

    let mut copy = Fixture::new(b"same bytes");
    copy.config.scratch_root = fixture.config.scratch_root.clone();
    let media = FakeMedia::new(2);
    let stylizer = FakeStylizer::default();
    copy.run(&media, &stylizer).unwrap();

    assert_eq!(media.extract_calls(), 0);
    assert!(stylizer.calls().is_empty());
}

#[test]
fn test_extracted_frame_count_wins_over_probe() {
    let fixture = Fixture::new(b"off by one");
    let mut media = FakeMedia::new(4);
    media.extract_count = Some(3);
    let stylizer = FakeStylizer::default();

    fixture.run(&media, &stylizer).unwrap();

    assert_eq!(stylizer.calls().len(), 3);
    assert_eq!(stylizer.calls()[2].1, fixture.config.end);
}

#[test]
fn test_interrupted_extraction_is_redone() {
    let fixture = Fixture::new(b"half extracted");
    let work_dir = fixture.work_dir();
    let staging = work_dir.reset_staging().unwrap();
    fs::write(staging.join("frame_0002.png"), b"leftover").unwrap();

    let media = FakeMedia::new(2);
    fixture.run(&media, &FakeStylizer::default()).unwrap();

    assert_eq!(media.extract_calls(), 1);
    assert!(!work_dir.staging_dir().exists());
}

/// 等到 `path` 出現（或逾時）後送出中斷信號
fn interrupt_when_exists(path: PathBuf, signal: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !path.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        signal.store(true, Ordering::SeqCst);
    })
}

#[test]
fn test_interrupt_during_frame_removes_partial_output() {
    let fixture = Fixture::new(b"ctrl-c mid frame");
    let media = FakeMedia::new(3);
    let stylizer = FakeStylizer::hanging_on("frame_0001.png");
    let work_dir = fixture.work_dir();
    let signal = Arc::new(AtomicBool::new(false));
    let interrupter = interrupt_when_exists(work_dir.partial_path(1), Arc::clone(&signal));

    let err = fixture
        .run_with_signal(&media, &stylizer, signal)
        .unwrap_err();
    interrupter.join().unwrap();

    assert!(matches!(
        err,
        JobError::Interrupted {
            stage: JobState::Processing
        }
    ));
    assert_eq!(stylizer.calls().len(), 1);
    assert!(!work_dir.partial_path(1).exists());
    assert!(!work_dir.processed_path(1).exists());
    assert!(work_dir.frame_path(1).exists());
    assert_eq!(media.recombine_calls(), 0);
}

#[test]
fn test_parallel_failure_stops_dispatch_and_reports_first_error() {
    let mut fixture = Fixture::new(b"parallel failure");
    fixture.config.workers = 3;
    let media = FakeMedia::new(12);
    let stylizer = FakeStylizer {
        delay: Duration::from_millis(50),
        ..FakeStylizer::failing_on("frame_0002.png")
    };

    let err = fixture.run(&media, &stylizer).unwrap_err();

    assert!(matches!(err, JobError::Frame { index: 2, .. }));
    assert!(stylizer.calls().len() < 12);
    assert_eq!(media.recombine_calls(), 0);

    let leftovers: Vec<_> = fs::read_dir(fixture.work_dir().path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("partial_"))
        .collect();
    assert!(leftovers.is_empty());
}

/// 真實子程序：關閉標準輸出但持續執行，直到被終止
#[cfg(unix)]
struct SilentSleeper;

#[cfg(unix)]
impl FrameStylizer for SilentSleeper {
    fn spawn(&self, _request: &StylizeRequest<'_>) -> Result<TaskHandle> {
        let child = std::process::Command::new("sleep")
            .arg("30")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        Ok(TaskHandle::from_child(child, parse_progress_line))
    }
}

#[cfg(unix)]
#[test]
fn test_interrupt_reaches_tool_with_closed_output() {
    let fixture = Fixture::new(b"silent tool");
    let media = FakeMedia::new(1);
    let signal = Arc::new(AtomicBool::new(false));
    let interrupter = {
        let signal = Arc::clone(&signal);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            signal.store(true, Ordering::SeqCst);
        })
    };

    let started = Instant::now();
    let err = fixture
        .run_with_signal(&media, &SilentSleeper, signal)
        .unwrap_err();
    interrupter.join().unwrap();

    assert!(matches!(err, JobError::Interrupted { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!fixture.work_dir().processed_path(1).exists());
}
