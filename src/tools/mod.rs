mod ffmpeg_command;
mod ffprobe_info;
mod file_hasher;
mod media_tools;
mod path_validator;
mod primitive_command;
mod task_handle;
mod work_dir;

pub use ffmpeg_command::FfmpegCommand;
pub use ffprobe_info::{FrameRate, MediaInfo, get_media_info};
pub use file_hasher::{JOB_DIGEST_LEN, calculate_file_hash, hash_reader, job_digest};
pub use media_tools::{FfmpegTools, FrameStylizer, MediaTools, StylizeRequest};
pub use path_validator::{ensure_directory_exists, validate_file_exists};
pub use primitive_command::{PrimitiveStylizer, parse_progress_line};
pub use task_handle::{ProgressEvent, TaskHandle, TaskOutcome};
pub use work_dir::{SCRATCH_PREFIX, WorkDir};
