use crate::codec::Codec;
use crate::error::{OptError, Result};
use crate::individual::Individual;
use crate::objective::ObjectiveEvaluator;
use crate::recorder::{GenerationStats, IndividualRecord, Recorder};
use log::debug;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

impl Population {
    pub fn new() -> Population {
        Population { individuals: Vec::new() }
    }

    /// `size` random genotypes drawn through the codec.
    pub fn generate<R: Rng>(size: usize, codec: &Codec, rng: &mut R) -> Population {
        Population {
            individuals: (0..size).map(|_| Individual::random(codec, rng)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Indices of individuals whose cache is empty.
    pub fn pending(&self) -> Vec<usize> {
        self.individuals
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.is_valid())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Decodes and evaluates every individual with an empty cache.
    ///
    /// Evaluations run on the current rayon pool. Results are committed and
    /// recorded in population order once all of them succeeded; the first
    /// failing individual (in population order) aborts with its error and
    /// leaves the population untouched. Returns the indices that were evaluated.
    pub fn evaluate<E>(
        &mut self,
        codec: &Codec,
        evaluator: &E,
        n_objectives: usize,
        timeout: Option<Duration>,
        generation: usize,
        recorder: &mut dyn Recorder,
    ) -> Result<Vec<usize>>
    where
        E: ObjectiveEvaluator + ?Sized,
    {
        let pending = self.pending();
        debug!("Evaluating {} individuals...", pending.len());

        let outcomes = {
            let individuals = &self.individuals;
            pending
                .par_iter()
                .map(|&idx| evaluate_one(&individuals[idx], idx, codec, evaluator, n_objectives, timeout))
                .collect::<Vec<Result<(Vec<f64>, Vec<f64>)>>>()
        };
        let outcomes = outcomes.into_iter().collect::<Result<Vec<(Vec<f64>, Vec<f64>)>>>()?;

        for (&idx, (parameters, objectives)) in pending.iter().zip(outcomes) {
            self.individuals[idx].fitness = Some(objectives.clone());
            recorder.record_individual(IndividualRecord {
                generation,
                parameters,
                objectives,
            });
        }

        Ok(pending)
    }

    pub fn objectives(&self) -> Vec<&[f64]> {
        self.individuals.iter().filter_map(|i| i.objectives()).collect()
    }

    pub fn stats(&self, generation: usize, n_evaluated: usize, archive_size: usize) -> GenerationStats {
        GenerationStats::from_objectives(generation, n_evaluated, archive_size, self.objectives())
    }
}

fn evaluate_one<E>(
    individual: &Individual,
    index: usize,
    codec: &Codec,
    evaluator: &E,
    n_objectives: usize,
    timeout: Option<Duration>,
) -> Result<(Vec<f64>, Vec<f64>)>
where
    E: ObjectiveEvaluator + ?Sized,
{
    let parameters = individual.decode(codec)?;

    let start = Instant::now();
    let objectives = evaluator.evaluate(&parameters).map_err(|e| OptError::Evaluation {
        index,
        message: e.to_string(),
    })?;
    let elapsed = start.elapsed();

    // a synchronous call cannot be interrupted, the deadline is checked on return
    if let Some(limit) = timeout {
        if elapsed > limit {
            return Err(OptError::EvaluationTimeout {
                index,
                elapsed: elapsed.as_secs_f64(),
                limit: limit.as_secs_f64(),
            });
        }
    }

    if objectives.len() != n_objectives {
        return Err(OptError::ObjectiveArity {
            expected: n_objectives,
            got: objectives.len(),
        });
    }

    Ok((parameters, objectives))
}
