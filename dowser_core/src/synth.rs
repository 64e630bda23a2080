use crate::network::{Network, NetworkError};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use thiserror::Error;

/// Fixed lead-in of the stimulus vector. Every trial starts from these values
/// so a network always sees a known anchor before the seeded noise.
pub const SENTINEL_INPUTS: [f64; 2] = [1.0, 0.0];

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Network activation failed: {0}")]
    Activation(#[from] NetworkError),
    #[error("Network produced no outputs")]
    EmptyOutput,
}

/// Turns one network activation into one candidate input.
///
/// The stimulus for trial `i` is the sentinel prefix followed by draws from a
/// ChaCha8 stream seeded with `i`, so every genome in a generation answers the
/// same question and the i-th trial is reproducible across runs and machines.
/// Each network output is clamped to `[0.0, 1.0]` and widened to a byte.
#[derive(Debug, Clone)]
pub struct InputSynthesizer {
    stimulus_len: usize,
}

impl InputSynthesizer {
    pub fn new(stimulus_len: usize) -> Self {
        Self {
            stimulus_len: stimulus_len.max(SENTINEL_INPUTS.len()),
        }
    }

    /// Resets the network, feeds it the trial's stimulus, and maps the outputs
    /// to bytes. The reset keeps recurrent networks from leaking state across
    /// trials.
    pub fn synthesize(
        &self,
        network: &mut dyn Network,
        trial_index: u32,
    ) -> Result<Vec<u8>, SynthesisError> {
        network.reset();
        let stimulus = self.stimulus(trial_index);
        let outputs = network.activate(&stimulus)?;
        if outputs.is_empty() {
            return Err(SynthesisError::EmptyOutput);
        }
        Ok(outputs
            .iter()
            .map(|&value| (value.clamp(0.0, 1.0) * 255.0) as u8)
            .collect())
    }

    fn stimulus(&self, trial_index: u32) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(u64::from(trial_index));
        let mut stimulus = Vec::with_capacity(self.stimulus_len);
        stimulus.extend_from_slice(&SENTINEL_INPUTS);
        while stimulus.len() < self.stimulus_len {
            stimulus.push(rng.random::<f64>());
        }
        stimulus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the first `width` stimulus values back as outputs and records
    /// how it was driven.
    struct EchoNetwork {
        width: usize,
        resets: usize,
        activations: usize,
    }

    impl EchoNetwork {
        fn new(width: usize) -> Self {
            Self {
                width,
                resets: 0,
                activations: 0,
            }
        }
    }

    impl Network for EchoNetwork {
        fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
            self.activations += 1;
            Ok(inputs.iter().take(self.width).copied().collect())
        }
        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    struct FixedNetwork {
        outputs: Vec<f64>,
    }

    impl Network for FixedNetwork {
        fn activate(&mut self, _inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
            Ok(self.outputs.clone())
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn same_trial_yields_identical_bytes() {
        let synthesizer = InputSynthesizer::new(32);
        let mut network = EchoNetwork::new(16);
        let first = synthesizer.synthesize(&mut network, 5).unwrap();
        let second = synthesizer.synthesize(&mut network, 5).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn distinct_trials_yield_distinct_bytes() {
        let synthesizer = InputSynthesizer::new(32);
        let mut network = EchoNetwork::new(16);
        let trial_zero = synthesizer.synthesize(&mut network, 0).unwrap();
        let trial_one = synthesizer.synthesize(&mut network, 1).unwrap();
        assert_ne!(trial_zero, trial_one);
    }

    #[test]
    fn stimulus_starts_with_sentinels() {
        let synthesizer = InputSynthesizer::new(8);
        let mut network = EchoNetwork::new(8);
        let bytes = synthesizer.synthesize(&mut network, 3).unwrap();
        // Sentinels echo straight through: 1.0 -> 255, 0.0 -> 0.
        assert_eq!(bytes[0], 255);
        assert_eq!(bytes[1], 0);
    }

    #[test]
    fn network_is_reset_before_each_activation() {
        let synthesizer = InputSynthesizer::new(8);
        let mut network = EchoNetwork::new(4);
        synthesizer.synthesize(&mut network, 0).unwrap();
        synthesizer.synthesize(&mut network, 1).unwrap();
        synthesizer.synthesize(&mut network, 2).unwrap();
        assert_eq!(network.resets, 3);
        assert_eq!(network.activations, 3);
    }

    #[test]
    fn outputs_clamp_then_scale_to_bytes() {
        let synthesizer = InputSynthesizer::new(8);
        let mut network = FixedNetwork {
            outputs: vec![-1.0, 0.0, 0.5, 1.0, 2.0],
        };
        let bytes = synthesizer.synthesize(&mut network, 0).unwrap();
        assert_eq!(bytes, vec![0, 0, 127, 255, 255]);
    }

    #[test]
    fn empty_output_is_an_error() {
        let synthesizer = InputSynthesizer::new(8);
        let mut network = FixedNetwork { outputs: vec![] };
        let result = synthesizer.synthesize(&mut network, 0);
        assert!(matches!(result, Err(SynthesisError::EmptyOutput)));
    }

    #[test]
    fn activation_failure_propagates() {
        struct BrokenNetwork;
        impl Network for BrokenNetwork {
            fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
                Err(NetworkError::InputArity {
                    expected: 4,
                    got: inputs.len(),
                })
            }
            fn reset(&mut self) {}
        }

        let synthesizer = InputSynthesizer::new(8);
        let result = synthesizer.synthesize(&mut BrokenNetwork, 0);
        assert!(matches!(result, Err(SynthesisError::Activation(_))));
    }
}
