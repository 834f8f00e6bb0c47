use crate::error::{OptError, Result};
use crate::objective::Direction;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub objectives: Objectives,
    #[serde(default)]
    pub ga: GA,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "output_dir_default")]
    pub output_dir: String,
    #[serde(default = "save_experiment_default")]
    pub save_exp: String,
}

/// Grid shared by every parameter: `low`, `low + step`, ... up to `high`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub low: f64,
    pub high: f64,
    pub step: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Encoding {
    #[serde(default = "n_params_default")]
    pub n_params: usize,
    #[serde(default = "param_range_default")]
    pub param_range: ParamRange,
}

/// Objective names and directions, matched by index.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Objectives {
    #[serde(default = "objective_names_default")]
    pub names: Vec<String>,
    #[serde(default = "directions_default")]
    pub directions: Vec<Direction>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "n_population_default")]
    pub n_population: usize,
    #[serde(default = "n_generation_default")]
    pub n_generation: usize,
    #[serde(default = "p_mate_default")]
    pub p_mate: f64,
    #[serde(default = "p_mutate_default")]
    pub p_mutate: f64,
    #[serde(default = "zero_default")]
    pub eval_timeout_secs: f64,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Encoding {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Objectives {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl GA {
    /// Per-evaluation deadline, `None` when `eval_timeout_secs` is 0.
    pub fn eval_timeout(&self) -> Result<Option<Duration>> {
        if self.eval_timeout_secs == 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f64(self.eval_timeout_secs)
            .map(Some)
            .map_err(|_| {
                OptError::Configuration(format!(
                    "Invalid eval_timeout_secs={}. Must be a finite number of seconds >= 0 (0 disables the deadline).",
                    self.eval_timeout_secs
                ))
            })
    }
}

impl Param {
    pub fn n_objectives(&self) -> usize {
        self.objectives.names.len()
    }
}

/// Loads a parameter file, applies `section.key=value` overrides on the raw
/// YAML tree, then deserializes and validates the result.
pub fn get_with_overrides<P: AsRef<Path>>(param_file: P, overrides: &[String]) -> Result<Param> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);
    let tree: serde_yaml::Value = serde_yaml::from_reader(param_reader)?;
    from_tree(tree, overrides)
}

/// Builds parameters from defaults plus overrides only.
pub fn from_overrides(overrides: &[String]) -> Result<Param> {
    let tree = serde_yaml::to_value(Param::default())?;
    from_tree(tree, overrides)
}

fn from_tree(mut tree: serde_yaml::Value, overrides: &[String]) -> Result<Param> {
    if tree.is_null() {
        tree = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }
    for item in overrides {
        apply_override(&mut tree, item)?;
    }
    let param: Param = serde_yaml::from_value(tree)?;
    validate(&param)?;
    Ok(param)
}

/// Applies one `section.key=value` override onto a YAML tree.
///
/// The value is parsed as YAML, so `ga.p_mate=0.8`, `general.log_base=run`
/// and `objectives.names=[sum,max]` all work.
pub fn apply_override(tree: &mut serde_yaml::Value, item: &str) -> Result<()> {
    let (key, raw_value) = item
        .split_once('=')
        .ok_or_else(|| OptError::Configuration(format!("Override '{}' is not of the form section.key=value", item)))?;

    let path: Vec<&str> = key.trim().split('.').collect();
    let [section, field] = path.as_slice() else {
        return Err(OptError::Configuration(format!(
            "Override key '{}' must be of the form section.key",
            key
        )));
    };

    let defaults = serde_yaml::to_value(Param::default())?;
    let known = defaults
        .get(*section)
        .and_then(|s| s.get(*field))
        .is_some();
    if !known {
        return Err(OptError::Configuration(format!("Hyper parameter '{}' does not exist.", key)));
    }

    let value: serde_yaml::Value = serde_yaml::from_str(raw_value)?;

    let root = tree
        .as_mapping_mut()
        .ok_or_else(|| OptError::Configuration("Parameter file root must be a mapping".to_string()))?;
    if !root.contains_key(*section) {
        root.insert(
            serde_yaml::Value::from(*section),
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        );
    }
    let section_map = root
        .get_mut(*section)
        .and_then(|s| s.as_mapping_mut())
        .ok_or_else(|| OptError::Configuration(format!("Section '{}' must be a mapping", section)))?;
    section_map.insert(serde_yaml::Value::from(*field), value);
    Ok(())
}

pub fn validate(param: &Param) -> Result<()> {
    validate_encoding(param)?;
    validate_objectives(param)?;
    validate_ga(param)?;

    if param.general.thread_number == 0 {
        return Err(OptError::Configuration("thread_number must be >= 1.".to_string()));
    }

    Ok(())
}

fn validate_encoding(param: &Param) -> Result<()> {
    let encoding = &param.encoding;
    let range = &encoding.param_range;

    if encoding.n_params == 0 {
        return Err(OptError::Configuration("n_params must be >= 1.".to_string()));
    }

    if !range.low.is_finite() || !range.high.is_finite() || !range.step.is_finite() {
        return Err(OptError::Configuration(format!(
            "Invalid param_range=({}, {}, {}). Bounds and step must be finite.",
            range.low, range.high, range.step
        )));
    }

    if range.low >= range.high {
        return Err(OptError::Configuration(format!(
            "Invalid param_range: low={} must be < high={}.",
            range.low, range.high
        )));
    }

    if range.step <= 0.0 {
        return Err(OptError::Configuration(format!(
            "Invalid param_range: step={} must be > 0.",
            range.step
        )));
    }

    // bit width checks live with the sizing logic
    crate::codec::Codec::new(encoding)?;
    Ok(())
}

fn validate_objectives(param: &Param) -> Result<()> {
    let objectives = &param.objectives;

    if objectives.names.is_empty() {
        return Err(OptError::Configuration("At least one objective is required.".to_string()));
    }

    if objectives.names.len() != objectives.directions.len() {
        return Err(OptError::Configuration(format!(
            "{} objectives declared but {} directions given.",
            objectives.names.len(),
            objectives.directions.len()
        )));
    }

    Ok(())
}

fn validate_ga(param: &Param) -> Result<()> {
    let ga = &param.ga;

    if ga.n_population == 0 {
        return Err(OptError::Configuration("n_population must be >= 1.".to_string()));
    }

    if !(0.0..=1.0).contains(&ga.p_mate) {
        return Err(OptError::Configuration(format!(
            "Invalid p_mate={:.3}. Must be in range [0, 1].",
            ga.p_mate
        )));
    }

    if !(0.0..=1.0).contains(&ga.p_mutate) {
        return Err(OptError::Configuration(format!(
            "Invalid p_mutate={:.3}. Must be in range [0, 1].",
            ga.p_mutate
        )));
    }

    ga.eval_timeout()?;

    if ga.n_population % 2 == 1 {
        warn!(
            "n_population={} is odd: the last parent of each generation is never mated.",
            ga.n_population
        );
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    42
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn output_dir_default() -> String {
    "results".to_string()
}
fn save_experiment_default() -> String {
    "experiment.json".to_string()
}
fn true_default() -> bool {
    true
}
fn one_default() -> usize {
    1
}
fn zero_default() -> f64 {
    0.0
}
fn n_params_default() -> usize {
    3
}
fn param_range_default() -> ParamRange {
    ParamRange { low: -1.0, high: 1.0, step: 0.01 }
}
fn objective_names_default() -> Vec<String> {
    vec!["sum".to_string(), "product".to_string()]
}
fn directions_default() -> Vec<Direction> {
    vec![Direction::Minimize, Direction::Minimize]
}
fn n_population_default() -> usize {
    8
}
fn n_generation_default() -> usize {
    50
}
fn p_mate_default() -> f64 {
    0.6
}
fn p_mutate_default() -> f64 {
    1.0
}
