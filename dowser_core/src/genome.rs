/// A `Genome` is one candidate in the population being evaluated.
///
/// Breeding, speciation, and everything else about how genomes evolve lives in
/// the caller's evolutionary library. The evaluator only needs an identity for
/// logging and a fitness slot it can fill in after each generation.
pub trait Genome: Send + Sync {
    /// Opaque identifier, stable for the lifetime of the genome.
    fn id(&self) -> u64;

    /// Fitness assigned by the most recent evaluation, `None` before the first.
    fn fitness(&self) -> Option<f64>;

    /// Overwrites the stored fitness. The evaluator calls this exactly once
    /// per genome per generation, after all workers have finished.
    fn set_fitness(&mut self, fitness: f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct PlainGenome {
        id: u64,
        fitness: Option<f64>,
    }

    impl Genome for PlainGenome {
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

    #[test]
    fn fitness_starts_unset_and_overwrites() {
        let mut genome = PlainGenome {
            id: 7,
            fitness: None,
        };
        assert_eq!(genome.id(), 7);
        assert!(genome.fitness().is_none());

        genome.set_fitness(2.5);
        assert_eq!(genome.fitness(), Some(2.5));

        genome.set_fitness(0.0);
        assert_eq!(genome.fitness(), Some(0.0));
    }
}
