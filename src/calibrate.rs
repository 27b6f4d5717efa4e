use serde::{Deserialize, Serialize};

/// The four analytes resolved by the six-channel differential head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Analyte {
    Glutamate,
    Glutamine,
    Glucose,
    Lactate,
}

impl Analyte {
    pub const ALL: [Analyte; 4] = [
        Analyte::Glutamate,
        Analyte::Glutamine,
        Analyte::Glucose,
        Analyte::Lactate,
    ];

    /// Stable position used for per-analyte arrays throughout the pipeline.
    pub fn index(self) -> usize {
        match self {
            Analyte::Glutamate => 0,
            Analyte::Glutamine => 1,
            Analyte::Glucose => 2,
            Analyte::Lactate => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Analyte::Glutamate => "Glutamate",
            Analyte::Glutamine => "Glutamine",
            Analyte::Glucose => "Glucose",
            Analyte::Lactate => "Lactate",
        }
    }
}

impl std::fmt::Display for Analyte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed per-analyte gain applied after blank subtraction.
pub const GAIN_TABLE: [f64; 4] = [0.97, 0.418, 0.6854, 0.0609];

/// One calibrated tick of the pipeline: four analyte values at a
/// monotonically increasing sample index. Immutable once produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibratedSample {
    pub index: u64,
    pub values: [f64; 4],
}

impl CalibratedSample {
    pub fn value(&self, analyte: Analyte) -> f64 {
        self.values[analyte.index()]
    }
}

/// Converts six channel currents into four analyte signals.
///
/// The channel pairing is fixed by the sensor wiring: each analyte electrode
/// is read against its blank, so the subtraction removes the common-mode
/// background before the gain is applied.
#[derive(Clone, Copy, Debug)]
pub struct Calibrator {
    gains: [f64; 4],
}

impl Default for Calibrator {
    fn default() -> Self {
        Self { gains: GAIN_TABLE }
    }
}

impl Calibrator {
    /// `currents` are ch1..ch6 in nanoamperes.
    pub fn calibrate(&self, currents: &[f64; 6]) -> [f64; 4] {
        let glutamate = currents[0] - currents[1];
        let glutamine = currents[2] - currents[0];
        let glucose = currents[4] - currents[3];
        let lactate = currents[5] - currents[3];
        [
            glutamate * self.gains[Analyte::Glutamate.index()],
            glutamine * self.gains[Analyte::Glutamine.index()],
            glucose * self.gains[Analyte::Glucose.index()],
            lactate * self.gains[Analyte::Lactate.index()],
        ]
    }

    pub fn sample(&self, index: u64, currents: &[f64; 6]) -> CalibratedSample {
        CalibratedSample {
            index,
            values: self.calibrate(currents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn pairing_and_gains_are_linear() {
        let currents = [1.25, -0.5, 3.0, 0.125, 4.5, -2.0];
        let calibrator = Calibrator::default();
        let values = calibrator.calibrate(&currents);
        assert!((values[0] - (currents[0] - currents[1]) * 0.97).abs() < EPS);
        assert!((values[1] - (currents[2] - currents[0]) * 0.418).abs() < EPS);
        assert!((values[2] - (currents[4] - currents[3]) * 0.6854).abs() < EPS);
        assert!((values[3] - (currents[5] - currents[3]) * 0.0609).abs() < EPS);
    }

    #[test]
    fn matched_blank_cancels() {
        // Identical signal and blank must calibrate to exactly zero.
        let values = Calibrator::default().calibrate(&[7.5; 6]);
        for v in values {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn sample_carries_index() {
        let sample = Calibrator::default().sample(42, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(sample.index, 42);
        assert!((sample.value(Analyte::Glutamate) - 0.97).abs() < EPS);
        assert!((sample.value(Analyte::Glutamine) + 0.418).abs() < EPS);
    }
}
