use crate::tick::Tick;
use std::path::PathBuf;
use std::time::SystemTime;

/// One capture file contributing frames to the trace.
#[derive(Debug, Clone)]
pub struct File {
    pub path: PathBuf,
    pub last_write_time: SystemTime,
    pub size: u64,
    pub first_tick: Tick,
    pub last_tick: Tick,
    pub frame_count: u32,
}
