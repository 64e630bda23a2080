pub mod activation;
pub mod config;
pub mod coverage;
pub mod evaluator;
pub mod fitness;
pub mod genome;
pub mod network;
pub mod probe;
pub mod synth;

pub use activation::{ActivationFn, ActivationRegistry};
pub use config::{DowserConfig, EvaluationSettings, HarnessSettings, ScoringMode};
pub use coverage::{AggregationError, Aggregator, BatchSample, CoverageMap, EdgeSet};
pub use evaluator::{GenerationSummary, ParallelEvaluator};
pub use fitness::{FitnessScorer, HarmonicScorer, MagicPrefixScorer, scorer_from_config};
pub use genome::Genome;
pub use network::{Network, NetworkError, NetworkFactory};
pub use probe::{CoverageProbe, INPUT_PLACEHOLDER, ProbeError, ShowmapProbe};
pub use synth::{InputSynthesizer, SENTINEL_INPUTS, SynthesisError};
