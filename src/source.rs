use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use log::info;

use crate::config::SerialConfig;
use crate::error::PipelineError;

/// Something the pipeline can pull raw sensor bytes from.
///
/// `Ok(None)` means the source is exhausted (end of a replayed capture) and
/// ends the run normally. `Ok(Some(chunk))` with an empty chunk means a live
/// source had nothing to deliver this tick; the caller just polls again.
/// `Err` is a fatal I/O failure.
pub trait ByteSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError>;
}

/// Finite source replaying stored bytes, from memory or a capture file.
pub struct ReplaySource {
    reader: Box<dyn Read + Send>,
    chunk: usize,
}

impl ReplaySource {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            reader: Box::new(io::Cursor::new(bytes)),
            chunk: 64,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            chunk: 4096,
        })
    }

}

impl ByteSource for ReplaySource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut buf = vec![0u8; self.chunk];
        let n = self.reader.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

/// In-memory source that hands chunks back exactly as queued; lets tests
/// control read boundaries and model live idle ticks.
pub struct ChunkedSource {
    queue: VecDeque<Vec<u8>>,
}

impl ChunkedSource {
    pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            queue: chunks.into_iter().collect(),
        }
    }
}

impl ByteSource for ChunkedSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        Ok(self.queue.pop_front())
    }
}

/// Live serial source. A read timeout is an idle tick, not an error; the
/// device paces itself at roughly one packet per polling interval.
pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
    chunk: usize,
}

impl SerialSource {
    pub fn open(config: &SerialConfig) -> Result<Self, PipelineError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()?;
        info!(
            "opened serial source {} at {} baud",
            config.port, config.baud_rate
        );
        Ok(Self {
            port,
            chunk: config.chunk.max(1),
        })
    }
}

impl ByteSource for SerialSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut buf = vec![0u8; self.chunk];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(Some(Vec::new())),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Some(Vec::new())),
            Err(e) => Err(PipelineError::Io(e)),
        }
    }
}
