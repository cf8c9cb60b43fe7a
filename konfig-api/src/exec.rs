//! Evaluation shared by every execution mode

use crate::config::RunConfig;
use crate::error::KonfigError;
use crate::types::{Argument, ExecProgramArgs, ExecProgramResult};
use konfig_config::Phase;
use konfig_core::runtime::{prepare, to_json, to_yaml, OutputOptions};
use konfig_core::{Evaluator, OptionArgs, PluginRegistry, Program, RuntimeError, Value};
use konfig_log::trace;
use std::collections::HashSet;

/// Argument names must be unique within a request
pub(crate) fn option_args(args: &[Argument]) -> Result<OptionArgs, KonfigError> {
    let mut seen = HashSet::new();
    for arg in args {
        if !seen.insert(arg.name.as_str()) {
            return Err(RuntimeError::new(format!("duplicate argument '{}'", arg.name)).into());
        }
    }
    Ok(OptionArgs::from_pairs(
        args.iter().map(|a| (a.name.as_str(), a.value.as_str())),
    ))
}

/// Run `program` with a fresh evaluator and encode the result
pub(crate) fn evaluate(
    program: &Program,
    files: Option<&[String]>,
    args: &ExecProgramArgs,
    config: &RunConfig,
    plugins: &PluginRegistry,
) -> Result<ExecProgramResult, KonfigError> {
    let options = option_args(&args.args)?;
    let mut evaluator = Evaluator::new(program, &options, plugins)
        .with_max_depth(config.limits.max_eval_depth)
        .with_max_len(config.limits.max_collection_len)
        .with_logger(config.logger.clone());
    if let Some(files) = files {
        evaluator = evaluator.with_files(files);
    }
    let evaluation = evaluator.run()?;

    let value = prepare(
        Value::Dict(evaluation.result),
        OutputOptions {
            disable_none: args.disable_none,
            sort_keys: args.sort_keys,
        },
    );
    let json_result = to_json(&value).map_err(KonfigError::Internal)?;
    let yaml_result = if args.disable_yaml_result {
        String::new()
    } else {
        to_yaml(&value).map_err(KonfigError::Internal)?
    };
    trace!(
        config.logger,
        target: Phase::Runtime.target(),
        "encoded result ({} bytes json, {} bytes yaml)",
        json_result.len(),
        yaml_result.len()
    );

    Ok(ExecProgramResult {
        json_result,
        yaml_result,
        stdout: evaluation.stdout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_argument_rejected() {
        let args = vec![Argument::new("foo", "1"), Argument::new("foo", "2")];
        let err = option_args(&args).unwrap_err();
        assert_eq!(err.phase(), "runtime");
        assert!(err.to_string().contains("duplicate argument 'foo'"));
    }

    #[test]
    fn test_distinct_arguments() {
        let args = vec![Argument::new("a", "1"), Argument::new("b", "x")];
        let options = option_args(&args).unwrap();
        assert_eq!(options.get("a"), Some("1"));
        assert_eq!(options.get("b"), Some("x"));
    }
}
