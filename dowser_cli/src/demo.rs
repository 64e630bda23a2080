//! Self-contained stand-ins for the evolutionary library the evaluator
//! normally plugs into: a genome that is just a weight seed, and a small
//! fixed-topology recurrent network decoded from it. Enough to drive the
//! pipeline end to end without a real neuroevolution setup.

use dowser_core::activation::{ActivationFn, ActivationRegistry};
use dowser_core::genome::Genome;
use dowser_core::network::{Network, NetworkError, NetworkFactory};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

const DEMO_HIDDEN_NODES: usize = 16;

/// Cardinal sine, registered as an extra activation so evolved nets can pick
/// an oscillating response.
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 { 1.0 } else { x.sin() / x }
}

/// A genome reduced to a single RNG seed; the factory decodes everything
/// else from it deterministically.
#[derive(Debug, Clone)]
pub struct SeedGenome {
    id: u64,
    weight_seed: u64,
    fitness: Option<f64>,
}

impl SeedGenome {
    pub fn new(id: u64, weight_seed: u64) -> Self {
        Self {
            id,
            weight_seed,
            fitness: None,
        }
    }

    pub fn weight_seed(&self) -> u64 {
        self.weight_seed
    }
}

impl Genome for SeedGenome {
    fn id(&self) -> u64 {
        self.id
    }
    fn fitness(&self) -> Option<f64> {
        self.fitness
    }
    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }
}

/// Decodes a [`SeedGenome`] into a one-hidden-layer recurrent network.
/// Weights and the two activation picks all come from a ChaCha8 stream
/// seeded with the genome's seed, so the same genome always decodes to the
/// same phenotype, on any machine.
pub struct DemoNetworkFactory {
    registry: ActivationRegistry,
    inputs: usize,
    outputs: usize,
}

impl DemoNetworkFactory {
    pub fn new(registry: ActivationRegistry, inputs: usize, outputs: usize) -> Self {
        Self {
            registry,
            inputs,
            outputs,
        }
    }

    fn pick_activation(&self, rng: &mut ChaCha8Rng) -> Result<ActivationFn, NetworkError> {
        let names = self.registry.names();
        if names.is_empty() {
            return Err(NetworkError::Build(
                "activation registry is empty".to_string(),
            ));
        }
        let name = names[rng.random_range(0..names.len())];
        self.registry
            .get(name)
            .ok_or_else(|| NetworkError::Build(format!("unknown activation {name}")))
    }
}

impl NetworkFactory<SeedGenome> for DemoNetworkFactory {
    fn create(&self, genome: &SeedGenome) -> Result<Box<dyn Network>, NetworkError> {
        let mut rng = ChaCha8Rng::seed_from_u64(genome.weight_seed());
        let hidden_act = self.pick_activation(&mut rng)?;
        let output_act = self.pick_activation(&mut rng)?;

        let input_scale = 1.0 / (self.inputs as f64).sqrt();
        let hidden_scale = 1.0 / (DEMO_HIDDEN_NODES as f64).sqrt();

        let w_in = random_matrix(&mut rng, DEMO_HIDDEN_NODES, self.inputs, input_scale);
        let w_rec = random_matrix(&mut rng, DEMO_HIDDEN_NODES, DEMO_HIDDEN_NODES, hidden_scale);
        let w_out = random_matrix(&mut rng, self.outputs, DEMO_HIDDEN_NODES, hidden_scale);
        let bias_hidden = random_row(&mut rng, DEMO_HIDDEN_NODES, 1.0);
        let bias_out = random_row(&mut rng, self.outputs, 1.0);

        Ok(Box::new(DemoRecurrentNetwork {
            input_len: self.inputs,
            w_in,
            w_rec,
            w_out,
            bias_hidden,
            bias_out,
            hidden_act,
            output_act,
            state: vec![0.0; DEMO_HIDDEN_NODES],
        }))
    }
}

fn random_matrix(rng: &mut ChaCha8Rng, rows: usize, cols: usize, scale: f64) -> Vec<Vec<f64>> {
    (0..rows).map(|_| random_row(rng, cols, scale)).collect()
}

fn random_row(rng: &mut ChaCha8Rng, len: usize, scale: f64) -> Vec<f64> {
    (0..len)
        .map(|_| rng.random_range(-1.0..1.0) * scale)
        .collect()
}

/// One hidden layer with a full recurrent loop, one output layer.
pub struct DemoRecurrentNetwork {
    input_len: usize,
    w_in: Vec<Vec<f64>>,
    w_rec: Vec<Vec<f64>>,
    w_out: Vec<Vec<f64>>,
    bias_hidden: Vec<f64>,
    bias_out: Vec<f64>,
    hidden_act: ActivationFn,
    output_act: ActivationFn,
    state: Vec<f64>,
}

impl Network for DemoRecurrentNetwork {
    fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
        if inputs.len() != self.input_len {
            return Err(NetworkError::InputArity {
                expected: self.input_len,
                got: inputs.len(),
            });
        }

        let mut next_state = vec![0.0; self.state.len()];
        for (node, weights) in self.w_in.iter().enumerate() {
            let mut sum = self.bias_hidden[node];
            for (weight, value) in weights.iter().zip(inputs) {
                sum += weight * value;
            }
            for (weight, value) in self.w_rec[node].iter().zip(&self.state) {
                sum += weight * value;
            }
            next_state[node] = (self.hidden_act)(sum);
        }
        self.state = next_state;

        let mut outputs = vec![0.0; self.w_out.len()];
        for (node, weights) in self.w_out.iter().enumerate() {
            let mut sum = self.bias_out[node];
            for (weight, value) in weights.iter().zip(&self.state) {
                sum += weight * value;
            }
            outputs[node] = (self.output_act)(sum);
        }
        Ok(outputs)
    }

    fn reset(&mut self) {
        self.state.fill(0.0);
    }
}
