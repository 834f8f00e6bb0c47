use crate::objective::Direction;
use crate::param::Param;
use crate::recorder::GenerationStats;
use chrono::Local;
use std::path::PathBuf;

/// `info!` that keeps ANSI colours only when the run displays them
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {
        if $colorful {
            log::info!($($arg)*);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&format!($($arg)*)));
        }
    };
}

/// Removes `ESC [ ... m` colour sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for d in chars.by_ref() {
                if d == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Values fixed once when a run starts and handed to everything that names outputs.
#[derive(Clone, Debug, PartialEq)]
pub struct RunContext {
    pub timestamp: String,
    pub run_dir: PathBuf,
}

impl RunContext {
    pub fn new(param: &Param) -> RunContext {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        RunContext::with_timestamp(param, timestamp)
    }

    pub fn with_timestamp(param: &Param, timestamp: String) -> RunContext {
        let run_dir = PathBuf::from(&param.general.output_dir).join(&timestamp);
        RunContext { timestamp, run_dir }
    }

    /// Path of the log file, when logging to file is requested.
    pub fn log_file(&self, param: &Param) -> Option<PathBuf> {
        if param.general.log_base.is_empty() {
            None
        } else {
            Some(
                self.run_dir
                    .join(format!("{}.{}", param.general.log_base, param.general.log_suffix)),
            )
        }
    }
}

pub fn display_epoch_legend(param: &Param) -> String {
    let objectives = param
        .objectives
        .names
        .iter()
        .zip(param.objectives.directions.iter())
        .map(|(name, direction)| {
            let arrow = match direction {
                Direction::Minimize => "↓",
                Direction::Maximize => "↑",
            };
            format!("{}{} [min, max]", name, arrow)
        })
        .collect::<Vec<String>>()
        .join(" | ");
    format!(
        "\x1b[1mgeneration | evaluated | archive | {}\x1b[0m",
        objectives
    )
}

pub fn display_epoch(stats: &GenerationStats, param: &Param) -> String {
    let objectives = stats
        .min
        .iter()
        .zip(stats.max.iter())
        .map(|(lo, hi)| format!("[{:.4}, {:.4}]", lo, hi))
        .collect::<Vec<String>>()
        .join(" | ");
    format!(
        "\x1b[1;93m#{:<4}\x1b[0m/{} | {:>4} | \x1b[92m{:>4}\x1b[0m | {}",
        stats.generation, param.ga.n_generation, stats.n_evaluated, stats.archive_size, objectives
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;93m#12\x1b[0m done"), "#12 done");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_run_context_paths() {
        let mut param = Param::default();
        param.general.output_dir = "out".to_string();
        let ctx = RunContext::with_timestamp(&param, "2024-01-01_00-00-00".to_string());
        assert_eq!(ctx.run_dir, PathBuf::from("out").join("2024-01-01_00-00-00"));
        assert!(ctx.log_file(&param).is_none());

        param.general.log_base = "run".to_string();
        assert_eq!(
            ctx.log_file(&param),
            Some(PathBuf::from("out").join("2024-01-01_00-00-00").join("run.log"))
        );
    }

    #[test]
    fn test_display_epoch_lists_each_objective() {
        let param = Param::default();
        let stats = GenerationStats {
            generation: 3,
            n_evaluated: 8,
            archive_size: 5,
            min: vec![-1.5, -0.25],
            max: vec![2.0, 0.5],
        };
        let line = strip_ansi(&display_epoch(&stats, &param));
        assert!(line.contains("#3"));
        assert!(line.contains("[-1.5000, 2.0000]"));
        assert!(line.contains("[-0.2500, 0.5000]"));

        let legend = strip_ansi(&display_epoch_legend(&param));
        assert!(legend.contains("sum↓"));
        assert!(legend.contains("product↓"));
    }
}
