use crate::codec::Codec;
use crate::error::{OptError, Result};
use crate::ga::Outcome;
use crate::param::Param;
use crate::recorder::{GenerationStats, History, IndividualRecord};
use crate::utils::RunContext;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One member of the final Pareto archive, decoded
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParetoEntry {
    /// Identifier hash of the genotype
    pub hash: u64,
    /// Gray-coded genotype
    pub genes: Vec<u8>,
    /// Generation that produced the genotype
    pub epoch: usize,
    pub parameters: Vec<f64>,
    pub objectives: Vec<f64>,
}

/// Complete run record
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e., timestamp and objectives
    pub id: String,
    /// Timestamp of the run start
    pub timestamp: String,
    /// Crate version and git hash used
    pub version: String,
    /// Parameters used
    pub parameters: Param,
    /// Genotype layout derived from the parameters
    pub codec: Codec,

    /// Non-dominated individuals found during the whole run
    pub pareto_front: Vec<ParetoEntry>,
    /// Per-generation statistics, generation 0 being the initial population
    pub generations: Vec<GenerationStats>,

    pub n_evaluations: usize,
    pub completed_generations: usize,
    /// Execution time in seconds
    pub execution_time: f64,
}

pub fn version() -> String {
    format!(
        "{}#{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GRAYOPT_GIT_SHA").unwrap_or("unknown")
    )
}

impl Experiment {
    pub fn from_outcome(outcome: &Outcome, codec: &Codec, param: &Param, ctx: &RunContext, execution_time: f64) -> Result<Experiment> {
        let pareto_front = outcome
            .archive
            .members
            .iter()
            .map(|member| -> Result<ParetoEntry> {
                Ok(ParetoEntry {
                    hash: member.hash,
                    genes: member.genes.clone(),
                    epoch: member.epoch,
                    parameters: member.decode(codec)?,
                    objectives: member.objectives().map(|o| o.to_vec()).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<ParetoEntry>>>()?;

        Ok(Experiment {
            id: format!("{}_{}", param.objectives.names.join("-"), ctx.timestamp),
            timestamp: ctx.timestamp.clone(),
            version: version(),
            parameters: param.clone(),
            codec: codec.clone(),
            pareto_front,
            generations: outcome.generations.clone(),
            n_evaluations: outcome.n_evaluations,
            completed_generations: outcome.completed_generations,
            execution_time,
        })
    }

    pub fn display_results(&self) -> String {
        let mut str = format!(
            "Run {} ({}): {} generations, {} evaluations in {:.2}s\nPareto front: {} individuals",
            self.id,
            self.version,
            self.completed_generations,
            self.n_evaluations,
            self.execution_time,
            self.pareto_front.len()
        );
        for (i, entry) in self.pareto_front.iter().enumerate() {
            str = format!(
                "{}\n{:03}-th: parameters = [{}]  objectives = [{}]",
                str,
                i,
                join_values(&entry.parameters, 5),
                join_values(&entry.objectives, 5)
            );
        }
        str
    }

    /// Saves the experiment in a suitable format based on file extension.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => self.save_json(path),
            "yaml" | "yml" => self.save_yaml(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in json.");
                self.save_json(path.with_extension("json"))
            }
        }
    }

    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn save_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves as Bincode (compact binary, Rust-only)
    fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        fs::write(path, encoded)?;
        Ok(())
    }

    /// Loads the experiment from a file, automatically detecting the format based on file extension.
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => Self::load_json(path),
            "yaml" | "yml" => Self::load_yaml(path),
            "bin" | "bincode" => Self::load_bincode(path),
            _ => Self::load_with_fallback(path),
        }
    }

    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Tries Bincode, then JSON, then YAML.
    fn load_with_fallback<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Ok(experiment) = Self::load_bincode(path) {
            return Ok(experiment);
        }

        if let Ok(experiment) = Self::load_json(path) {
            return Ok(experiment);
        }

        Self::load_yaml(path).map_err(|_| {
            OptError::Configuration(format!("Unable to load the experiment {}", path.display()))
        })
    }

    /// Writes the CSV tables consumed by plotting tools into `dir`:
    /// `pareto_front.csv`, `history.csv` and `generations.csv`.
    pub fn save_artifacts<P: AsRef<Path>>(&self, dir: P, history: &History) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let n_params = self.codec.n_params;
        let names = &self.parameters.objectives.names;

        let front: Vec<IndividualRecord> = self
            .pareto_front
            .iter()
            .map(|e| IndividualRecord {
                generation: e.epoch,
                parameters: e.parameters.clone(),
                objectives: e.objectives.clone(),
            })
            .collect();
        write_records(&dir.join("pareto_front.csv"), &front, n_params, names)?;
        write_records(&dir.join("history.csv"), &history.individuals, n_params, names)?;

        let mut writer = csv::Writer::from_path(dir.join("generations.csv"))?;
        let mut header = vec![
            "generation".to_string(),
            "n_evaluated".to_string(),
            "archive_size".to_string(),
        ];
        for name in names {
            header.push(format!("{}_min", name));
            header.push(format!("{}_max", name));
        }
        writer.write_record(&header)?;
        for stats in &self.generations {
            let mut row = vec![
                stats.generation.to_string(),
                stats.n_evaluated.to_string(),
                stats.archive_size.to_string(),
            ];
            for (lo, hi) in stats.min.iter().zip(stats.max.iter()) {
                row.push(lo.to_string());
                row.push(hi.to_string());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;

        info!("Artifacts written to {}", dir.display());
        Ok(())
    }
}

fn write_records(path: &Path, records: &[IndividualRecord], n_params: usize, names: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["generation".to_string()];
    header.extend((0..n_params).map(|i| format!("param_{}", i)));
    header.extend(names.iter().cloned());
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.generation.to_string()];
        row.extend(record.parameters.iter().map(|p| p.to_string()));
        row.extend(record.objectives.iter().map(|o| o.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn join_values(values: &[f64], precision: usize) -> String {
    values
        .iter()
        .map(|v| format!("{:.*}", precision, v))
        .collect::<Vec<String>>()
        .join(", ")
}
