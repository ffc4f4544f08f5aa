//! Per-worker execution traces.
//!
//! Each worker can dump one record per executed task into
//! `t<worker>_<suffix>.dump`. Records are 24 bytes, little-endian, tightly
//! packed: `task_id`, `start_ns`, `duration_ns`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const RECORD_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub task_id: u64,
    pub start_ns: u64,
    pub duration_ns: u64,
}

impl TraceRecord {
    fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[..8].copy_from_slice(&self.task_id.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.start_ns.to_le_bytes());
        bytes[16..].copy_from_slice(&self.duration_ns.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: [u8; RECORD_LEN]) -> Self {
        Self {
            task_id: u64::from_le_bytes(bytes[..8].try_into().unwrap()),
            start_ns: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            duration_ns: u64::from_le_bytes(bytes[16..].try_into().unwrap()),
        }
    }
}

/// File name for worker `worker` under the given run suffix.
pub fn trace_path(worker: usize, suffix: &str) -> PathBuf {
    PathBuf::from(format!("t{worker}_{suffix}.dump"))
}

pub fn write_trace(path: &Path, records: &[TraceRecord]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        writer.write_all(&record.to_bytes())?;
    }
    writer.flush()
}

pub fn read_trace(path: &Path) -> io::Result<Vec<TraceRecord>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut bytes = [0u8; RECORD_LEN];
    loop {
        match reader.read_exact(&mut bytes) {
            Ok(()) => records.push(TraceRecord::from_bytes(bytes)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        }
    }
    Ok(records)
}
