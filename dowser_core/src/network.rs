use crate::genome::Genome;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network construction failed: {0}")]
    Build(String),
    #[error("Activation expected {expected} inputs, got {got}")]
    InputArity { expected: usize, got: usize },
}

/// A `Network` is the phenotype decoded from a genome: it maps a stimulus
/// vector to an output vector and may carry recurrent state between
/// activations.
///
/// Implementations come from the caller's neuroevolution library via a
/// `NetworkFactory`. The evaluator treats them as black boxes: it calls
/// `reset` before every trial so that outputs depend only on the genome and
/// the trial's stimulus, never on leftover state from a previous trial.
pub trait Network {
    /// Feeds one stimulus through the network.
    ///
    /// # Returns
    /// The raw output vector, or a `NetworkError` if the stimulus does not
    /// match the network's input arity or the activation itself fails.
    fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError>;

    /// Clears all recurrent state. Called before every trial.
    fn reset(&mut self);
}

/// Builds the phenotype `Network` for a genome.
///
/// Instantiation can fail for malformed genomes (for example a disconnected
/// output node); the evaluator treats such a failure as an unrecoverable
/// per-genome error and floors that genome's fitness at zero.
pub trait NetworkFactory<G: Genome>: Send + Sync {
    fn create(&self, genome: &G) -> Result<Box<dyn Network>, NetworkError>;
}
