use crate::config::ScoringMode;
use crate::coverage::BatchSample;

/// Reward granted per matched leading signature byte by the magic-prefix
/// scorer. Large enough to dwarf any plausible edge-count score, so the two
/// modes never need to share a scale.
pub const PREFIX_BYTE_BONUS: f64 = 1000.0;

/// Reduces one genome's batch sample to a scalar fitness.
///
/// Scores are comparable only within a single scoring mode; swapping modes
/// mid-run would hand the caller's selection logic apples and oranges.
pub trait FitnessScorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, sample: &BatchSample) -> f64;
}

/// Sums a harmonic series over each edge's hit count:
/// an edge hit `c` times contributes `1 + 1/2 + ... + 1/c`.
///
/// The first trial to touch an edge earns a full point; repeat hits still
/// help but ever less, so broad coverage beats hammering one hot path.
#[derive(Debug, Default, Clone, Copy)]
pub struct HarmonicScorer;

impl HarmonicScorer {
    pub fn new() -> Self {
        Self
    }
}

impl FitnessScorer for HarmonicScorer {
    fn name(&self) -> &'static str {
        "edge-harmonic"
    }

    fn score(&self, sample: &BatchSample) -> f64 {
        sample
            .coverage
            .iter()
            .map(|(_, count)| harmonic_sum(count))
            .sum()
    }
}

fn harmonic_sum(count: u32) -> f64 {
    (1..=count).map(|k| 1.0 / f64::from(k)).sum()
}

/// Scores the batch by how far its best input matches a fixed byte signature
/// from the front, [`PREFIX_BYTE_BONUS`] per byte. Coverage is ignored.
#[derive(Debug, Clone)]
pub struct MagicPrefixScorer {
    signature: Vec<u8>,
}

impl MagicPrefixScorer {
    pub fn new(signature: impl Into<Vec<u8>>) -> Self {
        Self {
            signature: signature.into(),
        }
    }
}

impl FitnessScorer for MagicPrefixScorer {
    fn name(&self) -> &'static str {
        "magic-prefix"
    }

    fn score(&self, sample: &BatchSample) -> f64 {
        let best = sample
            .inputs
            .iter()
            .map(|input| prefix_match_len(input, &self.signature))
            .max()
            .unwrap_or(0);
        best as f64 * PREFIX_BYTE_BONUS
    }
}

fn prefix_match_len(input: &[u8], signature: &[u8]) -> usize {
    input
        .iter()
        .zip(signature)
        .take_while(|(byte, expected)| byte == expected)
        .count()
}

/// Builds the scorer a config asks for.
pub fn scorer_from_config(mode: &ScoringMode) -> Box<dyn FitnessScorer> {
    match mode {
        ScoringMode::EdgeHarmonic => Box::new(HarmonicScorer::new()),
        ScoringMode::MagicPrefix { signature } => {
            Box::new(MagicPrefixScorer::new(signature.as_bytes()))
        }
    }
}
