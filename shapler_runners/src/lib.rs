mod gradle;
mod log_file;

pub use gradle::{GradleRunner, DEFAULT_TIMEOUT};
pub use log_file::LogFileRunner;
