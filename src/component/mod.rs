//! 功能元件模組

pub mod video_stylizer;

pub use video_stylizer::VideoStylizer;
