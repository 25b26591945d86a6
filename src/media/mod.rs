pub mod ffmpeg;
pub mod job;
