use serde::{Deserialize, Serialize};

/// One evaluated individual, as handed to downstream history plots.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IndividualRecord {
    pub generation: usize,
    pub parameters: Vec<f64>,
    pub objectives: Vec<f64>,
}

/// Per-generation aggregate over the surviving population.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    /// Individuals whose objectives were computed during this generation
    pub n_evaluated: usize,
    pub archive_size: usize,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl GenerationStats {
    /// Per-objective min/max over a set of objective vectors.
    pub fn from_objectives<'a, I>(generation: usize, n_evaluated: usize, archive_size: usize, objectives: I) -> GenerationStats
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut min: Vec<f64> = Vec::new();
        let mut max: Vec<f64> = Vec::new();
        for values in objectives {
            if min.is_empty() {
                min = values.to_vec();
                max = values.to_vec();
                continue;
            }
            for (i, v) in values.iter().enumerate() {
                min[i] = min[i].min(*v);
                max[i] = max[i].max(*v);
            }
        }
        GenerationStats {
            generation,
            n_evaluated,
            archive_size,
            min,
            max,
        }
    }
}

/// Receives evaluation records in population order.
pub trait Recorder {
    fn record_individual(&mut self, record: IndividualRecord);
    fn record_generation(&mut self, stats: GenerationStats);

    /// Final archive, decoded, emitted once when the run finalizes.
    fn record_front(&mut self, _front: Vec<IndividualRecord>) {}
}

/// Keeps everything in memory, for artifacts written at the end of the run.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct History {
    pub individuals: Vec<IndividualRecord>,
    pub generations: Vec<GenerationStats>,
    pub front: Vec<IndividualRecord>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }
}

impl Recorder for History {
    fn record_individual(&mut self, record: IndividualRecord) {
        self.individuals.push(record);
    }

    fn record_generation(&mut self, stats: GenerationStats) {
        self.generations.push(stats);
    }

    fn record_front(&mut self, front: Vec<IndividualRecord>) {
        self.front = front;
    }
}

/// Discards everything.
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record_individual(&mut self, _record: IndividualRecord) {}
    fn record_generation(&mut self, _stats: GenerationStats) {}
}
