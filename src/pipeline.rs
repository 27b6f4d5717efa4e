use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::accumulate::{AcceptedReading, ReadingAccumulator, StepRecord};
use crate::calibrate::{Analyte, Calibrator};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::frame::{DecodedFrame, FrameDecoder};
use crate::recorder::{read_raw_log, RawLogRow};
use crate::source::ByteSource;
use crate::steady::SteadyStateWindow;

/// Everything the pipeline surfaces while running.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PipelineEvent {
    Reading(AcceptedReading),
    Step(StepRecord),
}

/// Final output of a pipeline run.
#[derive(Clone, Debug, Default)]
pub struct PipelineRun {
    /// Frames that passed validation and were decoded.
    pub frames: u64,
    /// Calibrated samples produced (equals `frames` for byte-stream runs).
    pub samples: u64,
    /// Accepted readings across all channels, in acceptance order.
    pub readings: Vec<AcceptedReading>,
    /// Step records, present only in stepped mode.
    pub steps: Vec<StepRecord>,
}

impl PipelineRun {
    pub fn readings_for(&self, analyte: Analyte) -> impl Iterator<Item = &AcceptedReading> {
        self.readings.iter().filter(move |r| r.analyte == analyte)
    }
}

/// Wires FrameDecoder → Calibrator → SteadyStateWindow → ReadingAccumulator
/// over a byte source (replayed or live) or a stored capture.
pub struct PipelineDriver {
    config: PipelineConfig,
    calibrator: Calibrator,
    windows: [SteadyStateWindow; 4],
    accumulator: ReadingAccumulator,
    frames: u64,
    samples: u64,
    readings: Vec<AcceptedReading>,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let windows = Analyte::ALL
            .map(|a| SteadyStateWindow::new(config.window, config.params(a).ss_threshold));
        let accumulator = ReadingAccumulator::new(&config);
        Ok(Self {
            config,
            calibrator: Calibrator::default(),
            windows,
            accumulator,
            frames: 0,
            samples: 0,
            readings: Vec::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn accumulator(&self) -> &ReadingAccumulator {
        &self.accumulator
    }

    /// Run one decoded frame through calibration and segmentation.
    pub fn process_frame(&mut self, frame: &DecodedFrame) -> Vec<PipelineEvent> {
        self.frames += 1;
        self.process_currents(&frame.currents_na())
    }

    /// Same path for capture replay, where the currents are already in nA.
    pub fn process_currents(&mut self, currents: &[f64; 6]) -> Vec<PipelineEvent> {
        let sample = self.calibrator.sample(self.samples, currents);
        self.samples += 1;
        let mut events = Vec::new();
        let mut window_completed = false;
        for analyte in Analyte::ALL {
            if !self.config.params(analyte).enabled {
                continue;
            }
            let Some(outcome) = self.windows[analyte.index()].push(sample.value(analyte)) else {
                continue;
            };
            window_completed = true;
            if !outcome.steady {
                debug!(
                    "{analyte}: window not steady (std {:.6} >= {:.6})",
                    outcome.std_dev,
                    self.windows[analyte.index()].threshold()
                );
                continue;
            }
            if let Some(reading) = self.accumulator.offer(analyte, outcome.candidate, sample.index)
            {
                self.readings.push(reading);
                events.push(PipelineEvent::Reading(reading));
            }
        }
        if window_completed {
            if let Some(step) = self.accumulator.maybe_emit_step() {
                events.push(PipelineEvent::Step(step));
            }
        }
        events
    }

    /// Drive a finite byte source to exhaustion. Framing errors are skipped
    /// silently inside the decoder; only source I/O failures abort the run.
    pub fn run(&mut self, source: &mut dyn ByteSource) -> Result<PipelineRun, PipelineError> {
        let mut decoder = FrameDecoder::new(self.config.packet_len);
        while let Some(chunk) = source.next_chunk()? {
            for byte in chunk {
                if let Some(frame) = decoder.push_byte(byte) {
                    self.process_frame(&frame);
                }
            }
        }
        info!(
            "replay finished: {} frames, {} readings",
            self.frames,
            self.readings.len()
        );
        Ok(self.snapshot())
    }

    /// Replay a stored raw capture through the calibration path.
    pub fn run_capture(&mut self, path: impl AsRef<Path>) -> Result<PipelineRun, PipelineError> {
        let rows = read_raw_log(path)?;
        Ok(self.run_rows(&rows))
    }

    pub fn run_rows(&mut self, rows: &[RawLogRow]) -> PipelineRun {
        for row in rows {
            self.process_currents(&row.currents_na);
        }
        self.snapshot()
    }

    fn snapshot(&self) -> PipelineRun {
        PipelineRun {
            frames: self.frames,
            samples: self.samples,
            readings: self.readings.clone(),
            steps: self.accumulator.steps().to_vec(),
        }
    }

    /// Start the live two-stage pipeline: an I/O thread frames raw bytes and
    /// a compute thread segments them, decoupled by a bounded drop-oldest
    /// queue so a stalled compute stage can never block the device read.
    pub fn spawn(
        self,
        mut source: impl ByteSource + Send + 'static,
        events: Sender<PipelineEvent>,
    ) -> LiveHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let queue = Arc::new(FrameQueue::bounded(self.config.queue_capacity));
        let packet_len = self.config.packet_len;

        let reader_stop = Arc::clone(&stop);
        let reader_queue = Arc::clone(&queue);
        let reader = thread::spawn(move || {
            let mut decoder = FrameDecoder::new(packet_len);
            let result = loop {
                if reader_stop.load(Ordering::SeqCst) {
                    break Ok(());
                }
                match source.next_chunk() {
                    Ok(None) => break Ok(()),
                    Ok(Some(chunk)) => {
                        for byte in chunk {
                            if let Some(frame) = decoder.push_byte(byte) {
                                reader_queue.push(frame);
                            }
                        }
                    }
                    Err(e) => break Err(e),
                }
            };
            reader_queue.close();
            result
        });

        let compute_queue = Arc::clone(&queue);
        let mut driver = self;
        let compute = thread::spawn(move || {
            while let Some(frame) = compute_queue.pop()? {
                for event in driver.process_frame(&frame) {
                    events.send(event).ok();
                }
            }
            let dropped = compute_queue.dropped();
            if dropped > 0 {
                warn!("live run dropped {dropped} frames under backpressure");
            }
            Ok(driver.snapshot())
        });

        LiveHandle {
            stop,
            reader,
            compute,
        }
    }
}

/// Handle to a running live pipeline.
pub struct LiveHandle {
    stop: Arc<AtomicBool>,
    reader: JoinHandle<Result<(), PipelineError>>,
    compute: JoinHandle<Result<PipelineRun, PipelineError>>,
}

impl LiveHandle {
    /// Request cancellation; partially filled windows are discarded, not
    /// flushed as readings.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait for both stages. A reader I/O failure wins over the compute
    /// result, since it is what actually ended the run.
    pub fn join(self) -> Result<PipelineRun, PipelineError> {
        let reader_result = self
            .reader
            .join()
            .map_err(|_| PipelineError::WorkerPanicked)?;
        let run = self
            .compute
            .join()
            .map_err(|_| PipelineError::WorkerPanicked)?;
        reader_result?;
        run
    }
}

/// Bounded frame queue between the I/O and compute stages. When full, the
/// oldest unconsumed frame is dropped: live sensor timing matters more than
/// retroactive reprocessing.
struct FrameQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

struct QueueState {
    frames: VecDeque<DecodedFrame>,
    closed: bool,
    dropped: u64,
}

impl FrameQueue {
    fn bounded(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    fn push(&self, frame: DecodedFrame) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.frames.len() == self.capacity {
            state.frames.pop_front();
            state.dropped += 1;
            warn!("frame queue full, dropping oldest frame");
        }
        state.frames.push_back(frame);
        self.available.notify_one();
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.available.notify_all();
    }

    /// Blocks until a frame arrives or the queue is closed and drained.
    fn pop(&self) -> Result<Option<DecodedFrame>, PipelineError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PipelineError::WorkerPanicked)?;
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Ok(Some(frame));
            }
            if state.closed {
                return Ok(None);
            }
            state = self
                .available
                .wait(state)
                .map_err(|_| PipelineError::WorkerPanicked)?;
        }
    }

    fn dropped(&self) -> u64 {
        self.state.lock().map(|s| s.dropped).unwrap_or(0)
    }
}
