use log::debug;

use crate::calibrate::Analyte;
use crate::config::{AnalyteParams, PipelineConfig};

/// One accepted steady-state reading. The per-channel log these land in is
/// append-only; nothing is ever rewritten after acceptance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcceptedReading {
    pub analyte: Analyte,
    pub value: f64,
    pub sample_index: u64,
}

/// Synchronized snapshot of the gated channels' latest accepted values,
/// emitted in stepped mode when every gated channel agrees on trend
/// direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepRecord {
    values: [Option<f64>; 4],
}

impl StepRecord {
    pub fn value(&self, analyte: Analyte) -> Option<f64> {
        self.values[analyte.index()]
    }
}

/// Steady candidates are folded to their magnitude and truncated to three
/// decimals before the hysteresis test, so the multiplicative band stays
/// well-defined for negative-going currents and the stored reading matches
/// what the band was tested against.
pub fn quantize_candidate(value: f64) -> f64 {
    (value.abs() * 1000.0).trunc() / 1000.0
}

struct ChannelState {
    params: AnalyteParams,
    readings: Vec<AcceptedReading>,
}

/// Decides which steady candidates become readings, and optionally gates
/// step records across channels.
pub struct ReadingAccumulator {
    min_gap: u64,
    channels: [ChannelState; 4],
    gate: Option<Vec<Analyte>>,
    /// Trend flag per analyte: `Some(true)` = last two accepted readings
    /// decreased. Cleared after every agreement event.
    trend: [Option<bool>; 4],
    steps: Vec<StepRecord>,
}

impl ReadingAccumulator {
    pub fn new(config: &PipelineConfig) -> Self {
        let channels = Analyte::ALL.map(|analyte| ChannelState {
            params: *config.params(analyte),
            readings: Vec::new(),
        });
        Self {
            min_gap: config.min_gap,
            channels,
            gate: config.step_gate.as_ref().map(|g| g.analytes.clone()),
            trend: [None; 4],
            steps: Vec::new(),
        }
    }

    pub fn readings(&self, analyte: Analyte) -> &[AcceptedReading] {
        &self.channels[analyte.index()].readings
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Offer a steady candidate for `analyte` observed at `sample_index`.
    /// Returns the reading when accepted.
    pub fn offer(
        &mut self,
        analyte: Analyte,
        candidate: f64,
        sample_index: u64,
    ) -> Option<AcceptedReading> {
        let value = quantize_candidate(candidate);
        let state = &mut self.channels[analyte.index()];
        if let Some(last) = state.readings.last() {
            let low = last.value * state.params.hysteresis_low;
            let high = last.value * state.params.hysteresis_high;
            if (low..=high).contains(&value) {
                debug!("{analyte}: candidate {value} inside hysteresis band [{low}, {high}]");
                return None;
            }
            let gap = sample_index - last.sample_index;
            if gap < self.min_gap {
                debug!(
                    "{analyte}: candidate {value} only {gap} samples after last reading \
                     (minimum {})",
                    self.min_gap
                );
                return None;
            }
        }
        let reading = AcceptedReading {
            analyte,
            value,
            sample_index,
        };
        debug!("{analyte}: accepted {value} at sample {sample_index}");
        state.readings.push(reading);
        Some(reading)
    }

    /// Refresh trend flags and emit a step record if every gated channel
    /// agrees on direction. Called once per window-analysis pass; a no-op in
    /// free-running mode.
    pub fn maybe_emit_step(&mut self) -> Option<StepRecord> {
        let gate = self.gate.as_ref()?;
        for analyte in gate {
            let readings = &self.channels[analyte.index()].readings;
            if readings.len() >= 2 {
                let prev = readings[readings.len() - 2].value;
                let last = readings[readings.len() - 1].value;
                self.trend[analyte.index()] = Some(prev > last);
            }
        }
        let mut directions = gate.iter().map(|a| self.trend[a.index()]);
        let first = directions.next().flatten()?;
        if !directions.all(|d| d == Some(first)) {
            return None;
        }
        let mut values = [None; 4];
        for analyte in gate {
            let state = &self.channels[analyte.index()];
            values[analyte.index()] = state.readings.last().map(|r| r.value);
        }
        let record = StepRecord { values };
        // One agreement event consumes the trend state either way.
        self.trend = [None; 4];
        if self.steps.last() == Some(&record) {
            debug!("step record identical to previous, not re-emitted");
            return None;
        }
        debug!("step record emitted: {record:?}");
        self.steps.push(record);
        Some(record)
    }
}
