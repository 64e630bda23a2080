use dowser_core::activation::ActivationRegistry;
use dowser_core::config::DowserConfig;
use dowser_core::evaluator::ParallelEvaluator;
use dowser_core::genome::Genome;
use dowser_core::network::NetworkFactory;
use dowser_core::probe::ShowmapProbe;
use dowser_core::synth::InputSynthesizer;

use clap::Parser;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;

mod demo;
use demo::{DemoNetworkFactory, SeedGenome};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Target command template, space separated; `@@` marks the input file slot.
    #[clap(long)]
    target_command: Option<String>,
    #[clap(short, long, default_value_t = 20)]
    generations: u64,
    #[clap(short, long, default_value_t = 24)]
    population: usize,
    #[clap(long)]
    workers: Option<usize>,
    /// Bytes per synthesized input, i.e. the demo network's output width.
    #[clap(long, default_value_t = 24)]
    input_bytes: usize,
    #[clap(short, long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config_file {
        Some(config_path) => {
            println!("Loading configuration from specified path: {config_path:?}");
            DowserConfig::load_from_file(&config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                println!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                DowserConfig::load_from_file(&default_config_path)?
            } else {
                println!(
                    "No config file specified and default 'config.toml' not found, using built-in defaults."
                );
                DowserConfig::default()
            }
        }
    };

    if let Some(target_cmd_str) = cli.target_command {
        let template: Vec<String> = target_cmd_str
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if template.is_empty() {
            return Err(anyhow::anyhow!("--target-command must not be empty"));
        }
        config.harness.target = template;
    }
    if let Some(workers) = cli.workers {
        config.evaluation.workers = workers;
    }
    config.validate()?;
    if cli.input_bytes == 0 {
        return Err(anyhow::anyhow!("--input-bytes must be at least 1"));
    }

    println!("Effective configuration: {config:#?}");

    let mut registry = ActivationRegistry::with_defaults();
    registry.register("sinc", demo::sinc);

    let factory =
        DemoNetworkFactory::new(registry, config.evaluation.network_inputs, cli.input_bytes);
    let probe = ShowmapProbe::new(config.harness.clone());
    let evaluator = ParallelEvaluator::new(&config, Box::new(probe));

    println!(
        "Random search: {} generations of {} genomes, {} trials each, {} workers, {} scoring.",
        cli.generations,
        cli.population,
        config.evaluation.num_trials,
        evaluator.worker_count(),
        evaluator.scorer_name(),
    );

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let mut best: Option<SeedGenome> = None;
    let start_time = Instant::now();

    for generation in 0..cli.generations {
        let mut population: Vec<SeedGenome> = (0..cli.population)
            .map(|slot| {
                let id = generation * cli.population as u64 + slot as u64;
                SeedGenome::new(id, rng.random::<u64>())
            })
            .collect();

        let summary = evaluator.evaluate_population(&mut population, &factory);

        for genome in &population {
            let fitness = genome.fitness().unwrap_or(0.0);
            let best_fitness = best
                .as_ref()
                .and_then(|current| current.fitness())
                .unwrap_or(f64::MIN);
            if fitness > best_fitness {
                best = Some(genome.clone());
            }
        }

        println!(
            "Generation {generation}: best {:.3}, mean {:.3}, floored {}",
            summary.best_fitness, summary.mean_fitness, summary.floored
        );
    }

    println!("Search finished in {:.2?}.", start_time.elapsed());
    match best {
        Some(winner) => {
            println!(
                "Winner: genome {} (seed {:#018x}) with fitness {:.3}",
                winner.id(),
                winner.weight_seed(),
                winner.fitness().unwrap_or(0.0)
            );
            let mut network = factory.create(&winner)?;
            let synthesizer = InputSynthesizer::new(config.evaluation.network_inputs);
            let showcase = synthesizer.synthesize(network.as_mut(), 0)?;
            println!(
                "Winner's trial-0 input ({} bytes): {}",
                showcase.len(),
                hex_preview(&showcase, 32)
            );
        }
        None => println!("No genomes were evaluated."),
    }

    Ok(())
}

fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let mut rendered: String = bytes.iter().take(limit).map(|b| format!("{b:02x}")).collect();
    if bytes.len() > limit {
        rendered.push_str("...");
    }
    rendered
}
