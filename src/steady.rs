/// Verdict for one completed (non-overlapping) window of samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowOutcome {
    pub steady: bool,
    /// Most recent sample in the window; offered to the accumulator when
    /// steady. The newest value, not the mean, is what the plateau settled
    /// on.
    pub candidate: f64,
    pub std_dev: f64,
}

/// Per-channel steady-state detector.
///
/// Samples accumulate until the counter exceeds the window size, then the
/// whole buffer is tested once and discarded; there is no sliding re-test
/// until the next window fills.
pub struct SteadyStateWindow {
    window: usize,
    threshold: f64,
    samples: Vec<f64>,
}

impl SteadyStateWindow {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window,
            threshold,
            samples: Vec::with_capacity(window + 1),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one calibrated value; returns a verdict each time a window
    /// completes.
    pub fn push(&mut self, value: f64) -> Option<WindowOutcome> {
        self.samples.push(value);
        if self.samples.len() <= self.window {
            return None;
        }
        let outcome = WindowOutcome {
            steady: self.is_steady(),
            // len > window >= 1, so last() cannot miss, but an empty buffer
            // must still degrade to "not steady" rather than panic.
            candidate: self.samples.last().copied().unwrap_or(0.0),
            std_dev: population_std_dev(&self.samples),
        };
        self.samples.clear();
        Some(outcome)
    }

    /// Discard any partially filled window (run cancellation).
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn is_steady(&self) -> bool {
        if self.samples.is_empty() {
            return false;
        }
        population_std_dev(&self.samples).abs() < self.threshold
    }
}

/// Population standard deviation over the window (same form the device
/// software used). Empty input yields 0.0; callers guard emptiness
/// separately so it never counts as steady.
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data
        .iter()
        .map(|v| {
            let delta = v - mean;
            delta * delta
        })
        .sum::<f64>()
        / data.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_verdict_before_window_fills() {
        let mut window = SteadyStateWindow::new(25, 0.006);
        for _ in 0..25 {
            assert!(window.push(1.0).is_none());
        }
        // The 26th sample tips the counter past the window.
        assert!(window.push(1.0).is_some());
    }

    #[test]
    fn flat_window_is_steady_with_latest_candidate() {
        let mut window = SteadyStateWindow::new(10, 0.006);
        let mut outcome = None;
        for i in 0..11 {
            // Constant except the very last sample nudged within threshold.
            let value = if i == 10 { 5.0001 } else { 5.0 };
            outcome = window.push(value);
        }
        let outcome = outcome.expect("window must complete");
        assert!(outcome.steady);
        assert_eq!(outcome.candidate, 5.0001);
    }

    #[test]
    fn noisy_window_is_not_steady() {
        let mut window = SteadyStateWindow::new(10, 0.006);
        let mut outcome = None;
        for i in 0..11 {
            outcome = window.push(if i % 2 == 0 { 1.0 } else { 2.0 });
        }
        assert!(!outcome.unwrap().steady);
    }

    #[test]
    fn buffer_resets_between_windows() {
        let mut window = SteadyStateWindow::new(4, 0.5);
        // First window: wild swings, not steady.
        for v in [0.0, 10.0, 0.0, 10.0, 0.0] {
            window.push(v);
        }
        // Second window must not see the first window's spread.
        let mut outcome = None;
        for _ in 0..5 {
            outcome = window.push(3.0);
        }
        let outcome = outcome.unwrap();
        assert!(outcome.steady);
        assert_eq!(outcome.std_dev, 0.0);
    }

    #[test]
    fn empty_input_guard() {
        assert_eq!(population_std_dev(&[]), 0.0);
        let window = SteadyStateWindow::new(5, 0.006);
        assert!(!window.is_steady());
    }

    #[test]
    fn random_noise_never_reads_as_steady() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let mut window = SteadyStateWindow::new(25, 0.006);
        let mut verdicts = 0;
        for _ in 0..260 {
            // Noise an order of magnitude above the threshold.
            if let Some(outcome) = window.push(rng.gen_range(-0.5..0.5)) {
                verdicts += 1;
                assert!(!outcome.steady);
            }
        }
        assert_eq!(verdicts, 10);
    }

    #[test]
    fn std_dev_matches_hand_computation() {
        // Population form: mean 1.0, deviations {-1, 1, -1, 1} -> std 1.0.
        let std = population_std_dev(&[0.0, 2.0, 0.0, 2.0]);
        assert!((std - 1.0).abs() < 1e-12);
    }
}
