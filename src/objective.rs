use crate::error::{OptError, Result};
use crate::param::Param;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optimization direction of one objective.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// True if `a` is strictly better than `b` along this direction.
    #[inline]
    pub fn better(&self, a: f64, b: f64) -> bool {
        match self {
            Direction::Minimize => a < b,
            Direction::Maximize => a > b,
        }
    }
}

/// Named reductions of a parameter vector to a single objective value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Product,
    Max,
    Min,
    Mean,
}

impl Reducer {
    pub fn apply(&self, params: &[f64]) -> f64 {
        match self {
            Reducer::Sum => params.iter().sum(),
            Reducer::Product => params.iter().product(),
            Reducer::Max => params.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Min => params.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Mean => {
                if params.is_empty() {
                    0.0
                } else {
                    params.iter().sum::<f64>() / params.len() as f64
                }
            }
        }
    }
}

impl FromStr for Reducer {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Reducer::Sum),
            "product" | "prod" => Ok(Reducer::Product),
            "max" => Ok(Reducer::Max),
            "min" => Ok(Reducer::Min),
            "mean" => Ok(Reducer::Mean),
            other => Err(OptError::Configuration(format!("Unknown objective reducer '{}'", other))),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reducer::Sum => "sum",
            Reducer::Product => "product",
            Reducer::Max => "max",
            Reducer::Min => "min",
            Reducer::Mean => "mean",
        };
        write!(f, "{}", name)
    }
}

/// Maps a decoded parameter vector to one value per objective.
///
/// Implementations must be deterministic: the engine caches the result on the
/// individual and never asks twice for an unchanged genotype. Evaluation may
/// run on several rayon workers at once, hence `Sync`.
pub trait ObjectiveEvaluator: Sync {
    fn evaluate(&self, params: &[f64]) -> Result<Vec<f64>>;
}

impl<F> ObjectiveEvaluator for F
where
    F: Fn(&[f64]) -> Result<Vec<f64>> + Sync,
{
    fn evaluate(&self, params: &[f64]) -> Result<Vec<f64>> {
        self(params)
    }
}

/// Applies one named reducer per objective over the whole parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducerEvaluator {
    pub reducers: Vec<Reducer>,
}

impl ReducerEvaluator {
    pub fn new(reducers: Vec<Reducer>) -> ReducerEvaluator {
        ReducerEvaluator { reducers }
    }

    pub fn from_param(param: &Param) -> Result<ReducerEvaluator> {
        let reducers = param
            .objectives
            .names
            .iter()
            .map(|name| name.parse::<Reducer>())
            .collect::<Result<Vec<Reducer>>>()?;
        Ok(ReducerEvaluator::new(reducers))
    }
}

impl ObjectiveEvaluator for ReducerEvaluator {
    fn evaluate(&self, params: &[f64]) -> Result<Vec<f64>> {
        Ok(self.reducers.iter().map(|r| r.apply(params)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducers() {
        let params = [0.5, -2.0, 4.0];
        assert_eq!(Reducer::Sum.apply(&params), 2.5);
        assert_eq!(Reducer::Product.apply(&params), -4.0);
        assert_eq!(Reducer::Max.apply(&params), 4.0);
        assert_eq!(Reducer::Min.apply(&params), -2.0);
        assert!((Reducer::Mean.apply(&params) - 2.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_reducer_parsing() {
        assert_eq!("sum".parse::<Reducer>().unwrap(), Reducer::Sum);
        assert_eq!(" Product ".parse::<Reducer>().unwrap(), Reducer::Product);
        assert_eq!("prod".parse::<Reducer>().unwrap(), Reducer::Product);
        assert!("median".parse::<Reducer>().unwrap_err().is_configuration());
        assert_eq!(Reducer::Max.to_string(), "max");
    }

    #[test]
    fn test_direction_better() {
        assert!(Direction::Minimize.better(1.0, 2.0));
        assert!(!Direction::Minimize.better(2.0, 2.0));
        assert!(Direction::Maximize.better(3.0, 2.0));
        assert!(!Direction::Maximize.better(1.0, 2.0));
    }

    #[test]
    fn test_direction_yaml_names() {
        let d: Direction = serde_yaml::from_str("maximize").unwrap();
        assert_eq!(d, Direction::Maximize);
        assert_eq!(serde_yaml::to_string(&Direction::Minimize).unwrap().trim(), "minimize");
    }

    #[test]
    fn test_reducer_evaluator_from_param() {
        let param = Param::default();
        let evaluator = ReducerEvaluator::from_param(&param).unwrap();
        assert_eq!(evaluator.evaluate(&[0.5, 0.5, 2.0]).unwrap(), vec![3.0, 0.5]);
    }

    #[test]
    fn test_reducer_evaluator_rejects_unknown_name() {
        let mut param = Param::default();
        param.objectives.names = vec!["sum".to_string(), "median".to_string()];
        assert!(ReducerEvaluator::from_param(&param).unwrap_err().is_configuration());
    }

    #[test]
    fn test_closure_is_evaluator() {
        let evaluator = |params: &[f64]| -> Result<Vec<f64>> { Ok(vec![params[0] * 2.0]) };
        assert_eq!(evaluator.evaluate(&[1.5]).unwrap(), vec![3.0]);
    }
}
