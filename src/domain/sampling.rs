use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::{DomainError, DomainResult};

pub const DEFAULT_FRAME_INTERVAL: i64 = 20;

/// Sampling stride for the frame sampler. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInterval(u64);

impl FrameInterval {
    pub fn new(interval: i64) -> DomainResult<Self> {
        if interval < 1 {
            return Err(DomainError::Config(format!(
                "frame interval must be >= 1, got {interval}"
            )));
        }
        Ok(Self(interval as u64))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn keeps(self, index: u64) -> bool {
        index % self.0 == 0
    }
}

impl Default for FrameInterval {
    fn default() -> Self {
        Self(DEFAULT_FRAME_INTERVAL as u64)
    }
}

pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:04}.jpg")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReport {
    pub frames_read: u64,
    pub written: Vec<PathBuf>,
}
