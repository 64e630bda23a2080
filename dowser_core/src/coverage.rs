use crate::network::Network;
use crate::probe::CoverageProbe;
use crate::synth::{InputSynthesizer, SynthesisError};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Edges touched by a single trial. Identifiers are opaque report lines.
pub type EdgeSet = HashSet<String>;

/// Multiset of edges accumulated over a genome's trial batch.
///
/// `count(edge)` is the number of trials whose executions touched that edge,
/// not the number of times the target itself crossed it. Counts only grow as
/// trials are merged in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageMap {
    hits: HashMap<String, u32>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_edge(&mut self, edge: &str) {
        *self.hits.entry(edge.to_string()).or_insert(0) += 1;
    }

    /// Folds one trial's edges in, bumping each edge's count by one.
    pub fn merge(&mut self, edges: &EdgeSet) {
        for edge in edges {
            self.record_edge(edge);
        }
    }

    pub fn count(&self, edge: &str) -> u32 {
        self.hits.get(edge).copied().unwrap_or(0)
    }

    pub fn distinct_edges(&self) -> usize {
        self.hits.len()
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.values().map(|&count| u64::from(count)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.hits.iter().map(|(edge, &count)| (edge.as_str(), count))
    }
}

/// Everything a scorer may look at for one genome: the aggregated coverage
/// and the raw inputs the trials ran.
#[derive(Debug, Clone, Default)]
pub struct BatchSample {
    pub coverage: CoverageMap,
    pub inputs: Vec<Vec<u8>>,
}

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("Input synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Runs a genome's full trial batch and folds the per-trial edge sets into
/// one [`BatchSample`].
///
/// A failed probe degrades that trial to zero edges and the batch carries on;
/// a failed synthesis abandons the batch, since a network that cannot
/// activate will not produce anything on later trials either.
pub struct Aggregator {
    synthesizer: InputSynthesizer,
    num_trials: u32,
}

impl Aggregator {
    pub fn new(synthesizer: InputSynthesizer, num_trials: u32) -> Self {
        Self {
            synthesizer,
            num_trials,
        }
    }

    /// Absorbing wrapper around [`try_collect`](Self::try_collect): an
    /// abandoned batch becomes an empty sample, which scores to zero.
    pub fn collect(&self, network: &mut dyn Network, probe: &dyn CoverageProbe) -> BatchSample {
        match self.try_collect(network, probe) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("batch abandoned, genome will score zero: {e}");
                BatchSample::default()
            }
        }
    }

    pub fn try_collect(
        &self,
        network: &mut dyn Network,
        probe: &dyn CoverageProbe,
    ) -> Result<BatchSample, AggregationError> {
        let mut sample = BatchSample::default();
        for trial in 0..self.num_trials {
            let input = self.synthesizer.synthesize(network, trial)?;
            match probe.probe(&input) {
                Ok(edges) => sample.coverage.merge(&edges),
                Err(e) => debug!("trial {trial} probe failed, counting no edges: {e}"),
            }
            sample.inputs.push(input);
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkError;
    use crate::probe::ProbeError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn edge_set(edges: &[&str]) -> EdgeSet {
        edges.iter().map(|s| s.to_string()).collect()
    }

    struct ScriptedProbe {
        responses: Mutex<VecDeque<Result<EdgeSet, ProbeError>>>,
    }

    impl ScriptedProbe {
        fn new(responses: Vec<Result<EdgeSet, ProbeError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl CoverageProbe for ScriptedProbe {
        fn probe(&self, _input: &[u8]) -> Result<EdgeSet, ProbeError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EdgeSet::new()))
        }
    }

    struct ConstNetwork {
        outputs: Vec<f64>,
    }

    impl Network for ConstNetwork {
        fn activate(&mut self, _inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
            Ok(self.outputs.clone())
        }
        fn reset(&mut self) {}
    }

    struct RefusingNetwork;

    impl Network for RefusingNetwork {
        fn activate(&mut self, _inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
            Err(NetworkError::Build("no phenotype".to_string()))
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn coverage_map_counts_per_trial_hits() {
        let mut map = CoverageMap::new();
        map.merge(&edge_set(&["a", "b"]));
        map.merge(&edge_set(&["b", "c"]));

        assert_eq!(map.count("a"), 1);
        assert_eq!(map.count("b"), 2);
        assert_eq!(map.count("c"), 1);
        assert_eq!(map.count("d"), 0);
        assert_eq!(map.distinct_edges(), 3);
        assert_eq!(map.total_hits(), 4);
    }

    #[test]
    fn duplicate_edges_within_one_trial_count_once() {
        // An EdgeSet is a set; the tracer reporting an edge twice in one run
        // still merges as a single hit.
        let mut map = CoverageMap::new();
        let mut edges = EdgeSet::new();
        edges.insert("a".to_string());
        edges.insert("a".to_string());
        map.merge(&edges);
        assert_eq!(map.count("a"), 1);
    }

    #[test]
    fn aggregator_accumulates_across_trials() {
        let probe = ScriptedProbe::new(vec![
            Ok(edge_set(&["a"])),
            Ok(edge_set(&["a", "b"])),
            Ok(edge_set(&["c"])),
        ]);
        let aggregator = Aggregator::new(InputSynthesizer::new(8), 3);
        let mut network = ConstNetwork {
            outputs: vec![0.5; 4],
        };

        let sample = aggregator.collect(&mut network, &probe);
        assert_eq!(sample.coverage.count("a"), 2);
        assert_eq!(sample.coverage.count("b"), 1);
        assert_eq!(sample.coverage.count("c"), 1);
        assert_eq!(sample.inputs.len(), 3);
    }

    #[test]
    fn failed_probe_degrades_single_trial() {
        let probe = ScriptedProbe::new(vec![
            Ok(edge_set(&["a"])),
            Err(ProbeError::NonZeroExit("code 1".to_string())),
            Ok(edge_set(&["a"])),
        ]);
        let aggregator = Aggregator::new(InputSynthesizer::new(8), 3);
        let mut network = ConstNetwork {
            outputs: vec![0.5; 4],
        };

        let sample = aggregator.collect(&mut network, &probe);
        assert_eq!(sample.coverage.count("a"), 2);
        assert_eq!(sample.coverage.distinct_edges(), 1);
        // The failed trial's input still took part in the batch.
        assert_eq!(sample.inputs.len(), 3);
    }

    #[test]
    fn failed_synthesis_abandons_the_batch() {
        let probe = ScriptedProbe::new(vec![Ok(edge_set(&["a"]))]);
        let aggregator = Aggregator::new(InputSynthesizer::new(8), 4);

        let result = aggregator.try_collect(&mut RefusingNetwork, &probe);
        assert!(matches!(result, Err(AggregationError::Synthesis(_))));

        let sample = aggregator.collect(&mut RefusingNetwork, &probe);
        assert!(sample.coverage.is_empty());
        assert!(sample.inputs.is_empty());
    }
}
