pub mod load;
pub mod types;

pub use load::{DEFAULT_SETTINGS_FILE, load_tool_settings};
pub use types::{DEFAULT_SHAPES, JobConfig, StylizeOptions, ToolSettings};
