//! Acquisition and steady-state segmentation pipeline for six-channel
//! amperometric biosensors: packet framing and validation, differential
//! calibration into four analyte signals, and per-channel plateau detection
//! with hysteresis and optional cross-channel step gating.

pub mod accumulate;
pub mod calibrate;
pub mod config;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod recorder;
pub mod source;
pub mod steady;

pub use accumulate::{AcceptedReading, ReadingAccumulator, StepRecord};
pub use calibrate::{Analyte, CalibratedSample, Calibrator};
pub use config::{AnalyteParams, PipelineConfig, SerialConfig, StepGateConfig};
pub use error::PipelineError;
pub use frame::{DecodedFrame, FrameDecoder};
pub use pipeline::{LiveHandle, PipelineDriver, PipelineEvent, PipelineRun};
pub use recorder::{RawLogRow, RawLogWriter, StepLogWriter, RAW_LOG_HEADER};
pub use source::{ByteSource, ChunkedSource, ReplaySource, SerialSource};
pub use steady::{SteadyStateWindow, WindowOutcome};
