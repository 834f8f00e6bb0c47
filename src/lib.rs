pub mod codec;
pub mod error;
pub mod experiment;
pub mod ga;
pub mod gray;
pub mod individual;
pub mod objective;
pub mod param;
pub mod pareto;
pub mod population;
pub mod recorder;
pub mod utils;

use crate::codec::Codec;
use crate::error::Result;
use crate::experiment::Experiment;
use crate::ga::{EvolutionEngine, Operators};
use crate::objective::{ObjectiveEvaluator, ReducerEvaluator};
use crate::param::Param;
use crate::recorder::History;
use crate::utils::RunContext;

use log::info;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Runs the optimizer on the objectives named in the parameters and writes
/// the run artifacts into `ctx.run_dir`.
pub fn run(param: &Param, ctx: &RunContext, running: Arc<AtomicBool>) -> Result<Experiment> {
    param::validate(param)?;
    let evaluator = ReducerEvaluator::from_param(param)?;
    cinfo!(
        param.general.display_colorful,
        "Optimizing {} parameters against [{}]\n-----------------------------------------------------",
        param.encoding.n_params,
        param.objectives.names.join(", ")
    );

    let (exp, history) = run_with_evaluator(param, ctx, &evaluator, Operators::default(), running)?;
    save_experiment(&exp, &history, param, ctx)?;
    Ok(exp)
}

/// Same as `run` for any evaluator and operator set, without touching the disk.
pub fn run_with_evaluator<E>(
    param: &Param,
    ctx: &RunContext,
    evaluator: &E,
    operators: Operators,
    running: Arc<AtomicBool>,
) -> Result<(Experiment, History)>
where
    E: ObjectiveEvaluator + ?Sized,
{
    let start = Instant::now();
    param::validate(param)?;
    let codec = Codec::new(&param.encoding)?;

    let pool = ThreadPoolBuilder::new()
        .num_threads(param.general.thread_number)
        .build()?;

    let mut history = History::new();
    let outcome = pool.install(|| {
        let engine = EvolutionEngine::new(param, evaluator, operators, running)?;
        engine.run(&mut history)
    })?;

    let exec_time = start.elapsed().as_secs_f64();
    let exp = Experiment::from_outcome(&outcome, &codec, param, ctx, exec_time)?;
    Ok((exp, history))
}

/// Writes the CSV artifacts and, if `save_exp` is set, the experiment file.
pub fn save_experiment(exp: &Experiment, history: &History, param: &Param, ctx: &RunContext) -> Result<()> {
    fs::create_dir_all(&ctx.run_dir)?;
    exp.save_artifacts(&ctx.run_dir, history)?;

    if !param.general.save_exp.is_empty() {
        let path = ctx.run_dir.join(&param.general.save_exp);
        exp.save_auto(&path)?;
        info!("Experiment saved to {}", path.display());
    }
    Ok(())
}
