use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibrate::Analyte;
use crate::error::PipelineError;
use crate::frame::MIN_PACKET_LEN;

/// Per-analyte tunables for the steady-state and acceptance stages.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AnalyteParams {
    pub enabled: bool,
    /// Population std-dev below this means the window is steady.
    pub ss_threshold: f64,
    /// Lower hysteresis multiplier around the last accepted reading.
    pub hysteresis_low: f64,
    /// Upper hysteresis multiplier around the last accepted reading.
    pub hysteresis_high: f64,
}

impl AnalyteParams {
    fn defaults_for(analyte: Analyte) -> Self {
        // Band pairs match the deployed sensor heads; glutamine saturates
        // earlier, hence the tighter upper multiplier.
        let hysteresis_high = match analyte {
            Analyte::Glutamine => 50.0,
            _ => 100.0,
        };
        Self {
            enabled: true,
            ss_threshold: 0.006,
            hysteresis_low: 0.2,
            hysteresis_high,
        }
    }
}

/// Cross-channel gating for stepped (titration) runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepGateConfig {
    pub analytes: Vec<Analyte>,
}

impl Default for StepGateConfig {
    fn default() -> Self {
        // Glutamate is left out of the gate by default: its trace is the
        // noisiest of the four and stalls agreement on real titrations.
        Self {
            analytes: vec![Analyte::Glutamine, Analyte::Glucose, Analyte::Lactate],
        }
    }
}

/// Everything the pipeline needs beyond the byte source itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wire packet length in bytes.
    pub packet_len: usize,
    /// Steady-state window size W; the verdict fires once the counter
    /// exceeds it.
    pub window: usize,
    /// Minimum sample-index distance between two accepted readings on the
    /// same channel.
    pub min_gap: u64,
    /// Bounded slack between the I/O and compute stages in live mode.
    pub queue_capacity: usize,
    pub channels: [AnalyteParams; 4],
    /// `None` runs free-running; `Some` enables stepped mode.
    pub step_gate: Option<StepGateConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            packet_len: 25,
            window: 25,
            min_gap: 200,
            queue_capacity: 8,
            channels: [
                AnalyteParams::defaults_for(Analyte::Glutamate),
                AnalyteParams::defaults_for(Analyte::Glutamine),
                AnalyteParams::defaults_for(Analyte::Glucose),
                AnalyteParams::defaults_for(Analyte::Lactate),
            ],
            step_gate: None,
        }
    }
}

impl PipelineConfig {
    pub fn params(&self, analyte: Analyte) -> &AnalyteParams {
        &self.channels[analyte.index()]
    }

    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.packet_len < MIN_PACKET_LEN {
            return Err(PipelineError::Config(format!(
                "packet_len {} is below the minimum of {MIN_PACKET_LEN}",
                self.packet_len
            )));
        }
        if self.window == 0 {
            return Err(PipelineError::Config("window must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config(
                "queue_capacity must be at least 1".into(),
            ));
        }
        for analyte in Analyte::ALL {
            let params = self.params(analyte);
            if !(params.ss_threshold > 0.0) {
                return Err(PipelineError::Config(format!(
                    "{analyte} ss_threshold must be positive"
                )));
            }
            if params.hysteresis_low >= params.hysteresis_high {
                return Err(PipelineError::Config(format!(
                    "{analyte} hysteresis band is inverted ({} >= {})",
                    params.hysteresis_low, params.hysteresis_high
                )));
            }
        }
        if let Some(gate) = &self.step_gate {
            if gate.analytes.is_empty() {
                return Err(PipelineError::Config(
                    "step gate needs at least one analyte".into(),
                ));
            }
            for analyte in &gate.analytes {
                if !self.params(*analyte).enabled {
                    return Err(PipelineError::Config(format!(
                        "step gate includes disabled analyte {analyte}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Live serial source settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    /// Largest single read handed to the framer.
    pub chunk: usize,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 9600,
            timeout_ms: 500,
            chunk: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn glutamine_band_is_tighter() {
        let config = PipelineConfig::default();
        assert_eq!(config.params(Analyte::Glutamine).hysteresis_high, 50.0);
        assert_eq!(config.params(Analyte::Glucose).hysteresis_high, 100.0);
    }

    #[test]
    fn short_packet_rejected() {
        let config = PipelineConfig {
            packet_len: 12,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn inverted_band_rejected() {
        let mut config = PipelineConfig::default();
        config.channels[0].hysteresis_low = 2.0;
        config.channels[0].hysteresis_high = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_gate_rejected() {
        let config = PipelineConfig {
            step_gate: Some(StepGateConfig { analytes: vec![] }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = PipelineConfig {
            window: 12,
            step_gate: Some(StepGateConfig::default()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back = PipelineConfig::from_json_str(&json).unwrap();
        assert_eq!(back.window, 12);
        assert_eq!(back.step_gate.unwrap().analytes.len(), 3);
    }
}
