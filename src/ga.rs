use crate::cinfo;
use crate::codec::Codec;
use crate::error::Result;
use crate::individual::Individual;
use crate::objective::{Direction, ObjectiveEvaluator};
use crate::param::{self, Param};
use crate::pareto::{select_nsga2, ParetoArchive};
use crate::population::Population;
use crate::recorder::{GenerationStats, IndividualRecord, Recorder};
use crate::utils::{display_epoch, display_epoch_legend};
use log::{debug, info};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

//-----------------------------------------------------------------------------
// Variation and selection strategies
//-----------------------------------------------------------------------------

/// Recombines two genotypes in place.
pub type CrossoverFn = Box<dyn Fn(&mut Individual, &mut Individual, &mut ChaCha8Rng) + Send + Sync>;
/// Mutates one genotype given a per-bit probability; returns true if a bit changed.
pub type MutationFn = Box<dyn Fn(&mut Individual, f64, &mut ChaCha8Rng) -> bool + Send + Sync>;
/// Picks `k` survivors from the union of parents and offspring.
pub type SelectionFn = Box<dyn Fn(Vec<Individual>, usize, &[Direction]) -> Vec<Individual> + Send + Sync>;

/// Operators injected into the engine.
pub struct Operators {
    pub crossover: CrossoverFn,
    pub mutate: MutationFn,
    pub select: SelectionFn,
}

impl Default for Operators {
    /// Two-point crossover, independent bit flips, NSGA-II selection.
    fn default() -> Self {
        Operators {
            crossover: Box::new(cross_over_two_point),
            mutate: Box::new(mutate_flip_bit),
            select: Box::new(select_nsga2),
        }
    }
}

/// Swaps the segment between two distinct cut points of both parents.
///
/// Cut points are drawn uniformly in `[1, len - 1]`. A genotype of length 2
/// only allows the cut at 1 (one-point swap of the last bit); shorter ones
/// are left untouched. Caches are dropped only on children whose bits changed.
pub fn cross_over_two_point(a: &mut Individual, b: &mut Individual, rng: &mut ChaCha8Rng) {
    let size = a.len().min(b.len());
    if size < 2 {
        return;
    }

    let (start, end) = if size == 2 {
        (1, 2)
    } else {
        let c1 = rng.gen_range(1..size);
        let mut c2 = rng.gen_range(1..size - 1);
        if c2 >= c1 {
            c2 += 1;
            (c1, c2)
        } else {
            (c2, c1)
        }
    };

    if a.genes[start..end] == b.genes[start..end] {
        return;
    }

    let parents = vec![a.hash, b.hash];
    a.genes[start..end].swap_with_slice(&mut b.genes[start..end]);
    for child in [a, b] {
        child.invalidate();
        child.compute_hash();
        child.parents = Some(parents.clone());
    }
}

/// Flips every bit independently with probability `indpb`.
pub fn mutate_flip_bit(individual: &mut Individual, indpb: f64, rng: &mut ChaCha8Rng) -> bool {
    let mut changed = false;
    for position in 0..individual.len() {
        if rng.gen_bool(indpb) {
            individual.flip(position);
            changed = true;
        }
    }
    if changed {
        individual.compute_hash();
    }
    changed
}

/// Builds an offspring population of the same size as the parents.
///
/// Parents are copied, paired in order (0,1), (2,3), ... and each pair is
/// recombined with probability `p_mate`; then every child is mutated with
/// probability `p_mutate` at a per-bit rate of `1 / len`. Children that come
/// out unchanged keep their parent's cached objectives.
pub fn vary(
    parents: &Population,
    operators: &Operators,
    p_mate: f64,
    p_mutate: f64,
    epoch: usize,
    rng: &mut ChaCha8Rng,
) -> Population {
    let mut offspring = parents.individuals.clone();

    for pair in offspring.chunks_exact_mut(2) {
        if rng.gen_bool(p_mate) {
            let (left, right) = pair.split_at_mut(1);
            (operators.crossover)(&mut left[0], &mut right[0], rng);
        }
    }

    for child in offspring.iter_mut() {
        if rng.gen_bool(p_mutate) && !child.is_empty() {
            let indpb = 1.0 / child.len() as f64;
            (operators.mutate)(child, indpb, rng);
        }
        if !child.is_valid() {
            child.epoch = epoch;
        }
    }

    Population { individuals: offspring }
}

//-----------------------------------------------------------------------------
// Generational engine
//-----------------------------------------------------------------------------

/// Steps of the generational loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Init,
    EvaluateInitial,
    Vary,
    EvaluateOffspring,
    Select,
    Finalize,
    Done,
}

/// Everything the engine hands back once it reaches `Done`.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub population: Population,
    pub archive: ParetoArchive,
    pub generations: Vec<GenerationStats>,
    pub n_evaluations: usize,
    /// Generations actually run, lower than requested if the run was interrupted
    pub completed_generations: usize,
}

/// Drives `Init -> EvaluateInitial -> (Vary -> EvaluateOffspring -> Select) x n_generation -> Finalize -> Done`.
///
/// The archive is only touched right after an evaluation step. The engine is
/// deterministic for a given seed, whatever the size of the rayon pool it runs on.
pub struct EvolutionEngine<'a, E: ObjectiveEvaluator + ?Sized> {
    param: Param,
    codec: Codec,
    evaluator: &'a E,
    operators: Operators,
    directions: Vec<Direction>,
    timeout: Option<Duration>,
    running: Arc<AtomicBool>,
    rng: ChaCha8Rng,

    stage: Stage,
    generation: usize,
    population: Population,
    offspring: Population,
    archive: ParetoArchive,
    generations: Vec<GenerationStats>,
    n_evaluations: usize,
    last_evaluated: usize,
}

impl<'a, E: ObjectiveEvaluator + ?Sized> EvolutionEngine<'a, E> {
    /// Validates the parameters and prepares an engine in the `Init` stage.
    pub fn new(param: &Param, evaluator: &'a E, operators: Operators, running: Arc<AtomicBool>) -> Result<Self> {
        param::validate(param)?;
        let codec = Codec::new(&param.encoding)?;

        let timeout = param.ga.eval_timeout()?;

        Ok(EvolutionEngine {
            param: param.clone(),
            codec,
            evaluator,
            operators,
            directions: param.objectives.directions.clone(),
            timeout,
            running,
            rng: ChaCha8Rng::seed_from_u64(param.general.seed),
            stage: Stage::Init,
            generation: 0,
            population: Population::new(),
            offspring: Population::new(),
            archive: ParetoArchive::new(),
            generations: Vec::new(),
            n_evaluations: 0,
            last_evaluated: 0,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn offspring(&self) -> &Population {
        &self.offspring
    }

    pub fn archive(&self) -> &ParetoArchive {
        &self.archive
    }

    /// Runs the current stage and moves to the next one.
    pub fn step(&mut self, recorder: &mut dyn Recorder) -> Result<Stage> {
        self.stage = match self.stage {
            Stage::Init => {
                self.population = Population::generate(self.param.ga.n_population, &self.codec, &mut self.rng);
                info!(
                    "Population size: {}, {} parameters on {} bits each ({} grid points)",
                    self.population.len(),
                    self.codec.n_params,
                    self.codec.bits_per_param,
                    self.codec.step_count
                );
                Stage::EvaluateInitial
            }
            Stage::EvaluateInitial => {
                let mut population = mem::take(&mut self.population);
                self.evaluate(&mut population, recorder)?;
                self.population = population;

                cinfo!(self.param.general.display_colorful, "{}", display_epoch_legend(&self.param));
                self.close_generation(recorder);
                self.next_or_finalize()
            }
            Stage::Vary => {
                self.generation += 1;
                self.offspring = vary(
                    &self.population,
                    &self.operators,
                    self.param.ga.p_mate,
                    self.param.ga.p_mutate,
                    self.generation,
                    &mut self.rng,
                );
                debug!(
                    "Generation {}: {} offspring, {} to evaluate",
                    self.generation,
                    self.offspring.len(),
                    self.offspring.pending().len()
                );
                Stage::EvaluateOffspring
            }
            Stage::EvaluateOffspring => {
                let mut offspring = mem::take(&mut self.offspring);
                self.evaluate(&mut offspring, recorder)?;
                // offspring that came out unchanged still compete with their cached objectives
                self.archive.update(offspring.individuals.iter(), &self.directions);
                self.offspring = offspring;
                Stage::Select
            }
            Stage::Select => {
                let mut union = mem::take(&mut self.population.individuals);
                union.append(&mut self.offspring.individuals);
                let survivors = (self.operators.select)(union, self.param.ga.n_population, &self.directions);
                self.population = Population { individuals: survivors };

                self.close_generation(recorder);
                self.next_or_finalize()
            }
            Stage::Finalize => {
                self.finalize(recorder)?;
                Stage::Done
            }
            Stage::Done => Stage::Done,
        };
        Ok(self.stage)
    }

    /// Steps until `Done`.
    pub fn run(mut self, recorder: &mut dyn Recorder) -> Result<Outcome> {
        let time = Instant::now();
        while self.stage != Stage::Done {
            self.step(recorder)?;
        }
        info!(
            "Genetic algorithm computed {} generations ({} evaluations) in {:.2?}",
            self.generation,
            self.n_evaluations,
            time.elapsed()
        );

        Ok(Outcome {
            population: self.population,
            archive: self.archive,
            generations: self.generations,
            n_evaluations: self.n_evaluations,
            completed_generations: self.generation,
        })
    }

    /// Evaluates and records pending individuals.
    fn evaluate(&mut self, population: &mut Population, recorder: &mut dyn Recorder) -> Result<()> {
        let evaluated = population.evaluate(
            &self.codec,
            self.evaluator,
            self.param.n_objectives(),
            self.timeout,
            self.generation,
            recorder,
        )?;
        self.n_evaluations += evaluated.len();
        self.last_evaluated = evaluated.len();
        Ok(())
    }

    fn close_generation(&mut self, recorder: &mut dyn Recorder) {
        let stats = self
            .population
            .stats(self.generation, self.last_evaluated, self.archive.len());
        cinfo!(self.param.general.display_colorful, "{}", display_epoch(&stats, &self.param));
        self.generations.push(stats.clone());
        recorder.record_generation(stats);
    }

    fn next_or_finalize(&self) -> Stage {
        if self.generation >= self.param.ga.n_generation {
            info!("Reach max generation");
            Stage::Finalize
        } else if !self.running.load(Ordering::Relaxed) {
            info!("Signal received");
            Stage::Finalize
        } else {
            Stage::Vary
        }
    }

    fn finalize(&self, recorder: &mut dyn Recorder) -> Result<()> {
        info!("Pareto front ({} individuals):", self.archive.len());
        let mut front = Vec::with_capacity(self.archive.len());
        for (i, member) in self.archive.members.iter().enumerate() {
            info!("{:03}-th: {}", i, member.display(&self.codec));
            front.push(IndividualRecord {
                generation: member.epoch,
                parameters: member.decode(&self.codec)?,
                objectives: member.objectives().map(|o| o.to_vec()).unwrap_or_default(),
            });
        }
        recorder.record_front(front);
        Ok(())
    }
}
