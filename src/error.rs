use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("malformed capture at line {line}: {reason}")]
    MalformedCapture { line: usize, reason: String },
    #[error("byte source I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port failure: {0}")]
    Serial(#[from] serialport::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("live pipeline worker panicked")]
    WorkerPanicked,
}
