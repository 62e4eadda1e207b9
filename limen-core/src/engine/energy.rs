//! RMS energy detector — the default, dependency-free backend.
//!
//! Scores each window by its root-mean-square level normalized to i16
//! full scale, so the reported probability lands in [0.0, 1.0] the same
//! way a model score would. A window counts as speech when that level
//! reaches the configured threshold.

use tracing::debug;

use super::{FrameScore, VadBackend, VadSession};
use crate::error::{LimenError, Result};

/// Factory for [`EnergySession`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyBackend;

impl VadBackend for EnergyBackend {
    fn version(&self) -> String {
        format!("energy-vad {}", env!("CARGO_PKG_VERSION"))
    }

    fn open(&self, hop_size: usize, threshold: f32) -> Result<Box<dyn VadSession>> {
        if hop_size == 0 {
            return Err(LimenError::InvalidConfig(
                "hop size must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LimenError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {threshold}"
            )));
        }
        debug!(hop_size, threshold, "opening energy detector");
        Ok(Box::new(EnergySession {
            hop_size,
            threshold,
            closed: false,
        }))
    }
}

/// RMS scorer for a fixed hop size.
#[derive(Debug)]
pub struct EnergySession {
    hop_size: usize,
    threshold: f32,
    closed: bool,
}

/// Root-mean-square of an i16 window, normalized so full scale is 1.0.
fn rms_full_scale(window: &[i16]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / window.len() as f64).sqrt();
    (rms / i16::MAX as f64) as f32
}

impl VadSession for EnergySession {
    fn process(&mut self, window: &[i16]) -> Result<FrameScore> {
        if self.closed {
            return Err(LimenError::SessionClosed);
        }
        if window.len() != self.hop_size {
            return Err(LimenError::WindowLength {
                expected: self.hop_size,
                got: window.len(),
            });
        }
        let probability = rms_full_scale(window).clamp(0.0, 1.0);
        Ok(FrameScore {
            probability,
            is_speech: probability >= self.threshold,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::Rng;

    fn open(hop: usize, threshold: f32) -> Box<dyn VadSession> {
        EnergyBackend
            .open(hop, threshold)
            .expect("energy session should open")
    }

    #[test]
    fn rejects_zero_hop() {
        let err = match EnergyBackend.open(0, 0.5) {
            Ok(_) => panic!("expected open to fail for zero hop"),
            Err(e) => e,
        };
        assert!(matches!(err, LimenError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        assert!(EnergyBackend.open(256, 1.5).is_err());
        assert!(EnergyBackend.open(256, -0.1).is_err());
    }

    #[test]
    fn silence_scores_zero_and_not_speech() {
        let mut session = open(160, 0.02);
        let score = session.process(&vec![0i16; 160]).expect("process");
        assert_abs_diff_eq!(score.probability, 0.0);
        assert!(!score.is_speech);
    }

    #[test]
    fn full_scale_square_wave_scores_one() {
        let window: Vec<i16> = (0..160)
            .map(|i| if i % 2 == 0 { i16::MAX } else { -i16::MAX })
            .collect();
        let mut session = open(160, 0.5);
        let score = session.process(&window).expect("process");
        assert_abs_diff_eq!(score.probability, 1.0, epsilon = 1e-4);
        assert!(score.is_speech);
    }

    #[test]
    fn quiet_tone_stays_below_threshold() {
        let window = vec![300i16; 160];
        let mut session = open(160, 0.05);
        let score = session.process(&window).expect("process");
        assert!(score.probability < 0.05, "probability={}", score.probability);
        assert!(!score.is_speech);
    }

    #[test]
    fn random_noise_probability_stays_in_unit_range() {
        let mut rng = rand::thread_rng();
        let window: Vec<i16> = (0..256).map(|_| rng.gen_range(-4000..4000)).collect();
        let mut session = open(256, 0.5);
        let score = session.process(&window).expect("process");
        assert!((0.0..=1.0).contains(&score.probability));
    }

    #[test]
    fn wrong_window_length_is_rejected() {
        let mut session = open(160, 0.5);
        let err = session.process(&vec![0i16; 159]).unwrap_err();
        assert!(
            err.to_string().contains("160"),
            "error should name the expected size: {err}"
        );
    }

    #[test]
    fn process_after_close_fails_but_close_repeats() {
        let mut session = open(160, 0.5);
        session.close().expect("first close");
        session.close().expect("second close");
        let err = session.process(&vec![0i16; 160]).unwrap_err();
        assert!(matches!(err, LimenError::SessionClosed));
    }
}
