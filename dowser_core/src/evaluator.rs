use crate::config::DowserConfig;
use crate::coverage::Aggregator;
use crate::fitness::{FitnessScorer, scorer_from_config};
use crate::genome::Genome;
use crate::network::NetworkFactory;
use crate::probe::CoverageProbe;
use crate::synth::InputSynthesizer;
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// What happened to one generation, for logging and for the caller's own
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    pub generation: u64,
    pub population: usize,
    /// Genomes whose evaluation finished before the deadline.
    pub evaluated: usize,
    /// Genomes floored to zero because no result arrived in time.
    pub floored: usize,
    pub best_genome: Option<u64>,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_distinct_edges: usize,
    pub elapsed: Duration,
}

impl GenerationSummary {
    /// One-line key=value rendering, emitted at info level after every
    /// generation.
    pub fn status_line(&self) -> String {
        format!(
            "ts={} generation={} population={} evaluated={} floored={} best-genome={} \
             best-fitness={:.4} mean-fitness={:.4} best-edges={} elapsed-ms={}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            self.generation,
            self.population,
            self.evaluated,
            self.floored,
            self.best_genome
                .map_or_else(|| "none".to_string(), |id| id.to_string()),
            self.best_fitness,
            self.mean_fitness,
            self.best_distinct_edges,
            self.elapsed.as_millis(),
        )
    }
}

/// Fans a population out over a fixed pool of worker threads and joins on the
/// full generation before anyone touches fitness.
///
/// Workers pull genome indices from a shared queue, run the trial batch, and
/// send `(index, fitness, edges)` back over a channel. Only this thread ever
/// writes fitness, and only after every worker has finished, so a generation
/// is a hard barrier: no genome from generation N+1 starts while N is still
/// in flight, and no partially evaluated genome is ever visible to the
/// caller.
///
/// Any per-genome failure, including a panic inside network code, floors that
/// genome's fitness at zero instead of taking the generation down. With a
/// configured deadline, genomes whose results have not arrived when it
/// expires are floored the same way.
pub struct ParallelEvaluator {
    aggregator: Aggregator,
    scorer: Box<dyn FitnessScorer>,
    probe: Box<dyn CoverageProbe>,
    workers: usize,
    deadline: Option<Duration>,
    generation: AtomicU64,
}

impl ParallelEvaluator {
    pub fn new(config: &DowserConfig, probe: Box<dyn CoverageProbe>) -> Self {
        let synthesizer = InputSynthesizer::new(config.evaluation.network_inputs);
        let workers = if config.evaluation.workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            config.evaluation.workers
        };
        let deadline = (config.evaluation.deadline_ms > 0)
            .then(|| Duration::from_millis(config.evaluation.deadline_ms));
        Self {
            aggregator: Aggregator::new(synthesizer, config.evaluation.num_trials),
            scorer: scorer_from_config(&config.evaluation.scoring),
            probe,
            workers,
            deadline,
            generation: AtomicU64::new(0),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Evaluates one generation and assigns every genome a fitness.
    ///
    /// Returns only after the whole generation is settled; on return every
    /// genome's fitness is `Some`.
    pub fn evaluate_population<G: Genome>(
        &self,
        genomes: &mut [G],
        factory: &dyn NetworkFactory<G>,
    ) -> GenerationSummary {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let population = genomes.len();

        let mut results: Vec<Option<(f64, usize)>> = vec![None; population];

        if population > 0 {
            let worker_count = self.workers.min(population);
            let cancelled = AtomicBool::new(false);

            let (task_tx, task_rx) = mpsc::channel::<usize>();
            for index in 0..population {
                let _ = task_tx.send(index);
            }
            // Queue is pre-filled; once it drains, workers see a closed
            // channel and exit.
            drop(task_tx);
            let task_queue = Mutex::new(task_rx);

            let (result_tx, result_rx) = mpsc::channel::<(usize, f64, usize)>();

            let shared: &[G] = genomes;
            thread::scope(|scope| {
                for _ in 0..worker_count {
                    let result_tx = result_tx.clone();
                    let task_queue = &task_queue;
                    let cancelled = &cancelled;
                    scope.spawn(move || {
                        loop {
                            if cancelled.load(Ordering::Relaxed) {
                                break;
                            }
                            let next = {
                                let queue = match task_queue.lock() {
                                    Ok(queue) => queue,
                                    Err(_) => break,
                                };
                                queue.recv()
                            };
                            let index = match next {
                                Ok(index) => index,
                                Err(_) => break,
                            };
                            let genome = &shared[index];
                            let outcome = catch_unwind(AssertUnwindSafe(|| {
                                self.evaluate_one(genome, factory)
                            }));
                            let (fitness, distinct_edges) = match outcome {
                                Ok(result) => result,
                                Err(_) => {
                                    warn!(
                                        "Evaluation panicked for genome {}, flooring fitness",
                                        genome.id()
                                    );
                                    (0.0, 0)
                                }
                            };
                            if result_tx.send((index, fitness, distinct_edges)).is_err() {
                                break;
                            }
                        }
                    });
                }
                drop(result_tx);

                let mut received = 0usize;
                while received < population {
                    let message = match self.deadline {
                        Some(deadline) => {
                            let remaining = deadline
                                .checked_sub(started.elapsed())
                                .unwrap_or(Duration::ZERO);
                            match result_rx.recv_timeout(remaining) {
                                Ok(message) => message,
                                Err(RecvTimeoutError::Timeout) => {
                                    warn!(
                                        "Generation {generation} hit its {deadline:?} deadline \
                                         after {received} of {population} results"
                                    );
                                    cancelled.store(true, Ordering::Relaxed);
                                    break;
                                }
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        None => match result_rx.recv() {
                            Ok(message) => message,
                            Err(_) => break,
                        },
                    };
                    let (index, fitness, distinct_edges) = message;
                    results[index] = Some((fitness, distinct_edges));
                    received += 1;
                }
            });
        }

        // Workers have all joined; this thread is the only writer from here.
        let mut evaluated = 0usize;
        let mut floored = 0usize;
        for (genome, result) in genomes.iter_mut().zip(&results) {
            match result {
                Some((fitness, _)) => {
                    genome.set_fitness(*fitness);
                    evaluated += 1;
                }
                None => {
                    genome.set_fitness(0.0);
                    floored += 1;
                }
            }
        }

        let mut best_index: Option<usize> = None;
        let mut best_fitness = 0.0;
        let mut fitness_total = 0.0;
        for (index, result) in results.iter().enumerate() {
            let fitness = result.map_or(0.0, |(fitness, _)| fitness);
            fitness_total += fitness;
            if best_index.is_none() || fitness > best_fitness {
                best_index = Some(index);
                best_fitness = fitness;
            }
        }

        let summary = GenerationSummary {
            generation,
            population,
            evaluated,
            floored,
            best_genome: best_index.map(|index| genomes[index].id()),
            best_fitness,
            mean_fitness: if population > 0 {
                fitness_total / population as f64
            } else {
                0.0
            },
            best_distinct_edges: best_index
                .and_then(|index| results[index])
                .map_or(0, |(_, distinct_edges)| distinct_edges),
            elapsed: started.elapsed(),
        };
        info!("{}", summary.status_line());
        summary
    }

    fn evaluate_one<G: Genome>(&self, genome: &G, factory: &dyn NetworkFactory<G>) -> (f64, usize) {
        let mut network = match factory.create(genome) {
            Ok(network) => network,
            Err(e) => {
                warn!(
                    "Network build failed for genome {}, flooring fitness: {e}",
                    genome.id()
                );
                return (0.0, 0);
            }
        };
        let sample = self
            .aggregator
            .collect(network.as_mut(), self.probe.as_ref());
        let distinct_edges = sample.coverage.distinct_edges();
        (self.scorer.score(&sample), distinct_edges)
    }
}
