//! Service client
//!
//! [`NativeServiceClient`] is the shared handle every caller goes through.
//! It holds only immutable configuration plus references to the process-wide
//! plugin registry and artifact loader, so one instance can serve any number
//! of threads without caller-side locking. Each operation builds its own
//! compiler state and evaluator.

use crate::config::{self, RunConfig};
use crate::error::KonfigError;
use crate::exec::evaluate;
use crate::loader::ArtifactLoader;
use crate::store;
use crate::types::{
    BuildProgramArgs, BuildProgramResult, ExecArtifactArgs, ExecProgramArgs, ExecProgramResult,
    ListOptionsResult, OptionHelp, ParseFileArgs, ParseFileResult, ParseProgramArgs,
};
use konfig_config::Phase;
use konfig_core::compiler::DEFAULT_FILENAME;
use konfig_core::runtime::global_plugins;
use konfig_core::{decode_artifact, Compiler, PluginRegistry, SourceProgram};
use konfig_log::{debug, error, info};
use std::path::Path;

/// Log lines included when an internal error is reported
const RECENT_LOG_LINES: usize = 200;

/// Operations of the build-and-execute service
pub trait ServiceClient: Send + Sync {
    /// Parse one file without resolving its imports
    fn parse_file(&self, args: &ParseFileArgs) -> Result<ParseFileResult, KonfigError>;

    /// Compile a program and atomically write the artifact to `args.output`
    fn build_program(&self, args: &BuildProgramArgs) -> Result<BuildProgramResult, KonfigError>;

    /// Compile and run a program
    fn exec_program(&self, args: &ExecProgramArgs) -> Result<ExecProgramResult, KonfigError>;

    /// Run a previously built artifact
    fn exec_artifact(&self, args: &ExecArtifactArgs) -> Result<ExecProgramResult, KonfigError>;

    /// Every `option()` the reachable program declares
    fn list_options(&self, args: &ParseProgramArgs) -> Result<ListOptionsResult, KonfigError>;
}

/// In-process implementation of [`ServiceClient`]
pub struct NativeServiceClient {
    config: RunConfig,
    plugins: &'static PluginRegistry,
    loader: ArtifactLoader,
}

impl std::fmt::Debug for NativeServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeServiceClient")
            .field("config", &self.config)
            .field("plugins", &self.plugins.names())
            .finish()
    }
}

impl Default for NativeServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeServiceClient {
    /// Client using the global configuration
    pub fn new() -> Self {
        Self::with_config(config::config().clone())
    }

    pub fn with_config(config: RunConfig) -> Self {
        Self {
            config,
            plugins: global_plugins(),
            loader: ArtifactLoader::global().clone(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one operation inside a span named after it, logging failures
    fn traced<T>(
        &self,
        op: &'static str,
        run: impl FnOnce() -> Result<T, KonfigError>,
    ) -> Result<T, KonfigError> {
        let _span = self.config.logger.enter_span(op);
        let result = run();
        if let Err(err) = &result {
            self.report_failure(op, err);
        }
        result
    }

    /// Internal errors also dump the buffered log records
    fn report_failure(&self, op: &str, err: &KonfigError) {
        let logger = &self.config.logger;
        debug!(logger, target: Phase::Service.target(), "{} failed: {}", op, err);
        if let KonfigError::Internal(_) = err {
            error!(logger, target: Phase::Service.target(), "{}: {}", op, err);
            if let Some(dump) = self.config.recent_log(RECENT_LOG_LINES) {
                error!(
                    logger,
                    target: Phase::Service.target(),
                    "recent log records:\n{}",
                    dump
                );
            }
        }
    }

    fn compiler(&self) -> Compiler {
        Compiler::new(self.config.compiler.clone(), self.config.limits.clone())
            .with_logger(self.config.logger.clone())
    }

    fn source(args: &ParseProgramArgs) -> Result<SourceProgram, KonfigError> {
        Ok(SourceProgram::from_lists(
            args.work_dir.as_deref(),
            &args.k_filename_list,
            &args.k_code_list,
        )?)
    }
}

impl ServiceClient for NativeServiceClient {
    fn parse_file(&self, args: &ParseFileArgs) -> Result<ParseFileResult, KonfigError> {
        self.traced("parse_file", || {
            let filename = if args.path.is_empty() {
                DEFAULT_FILENAME
            } else {
                args.path.as_str()
            };
            let parsed = self.compiler().parse_file(filename, args.source.as_deref())?;
            let ast_json = serde_json::to_string(&parsed.module).map_err(|e| {
                KonfigError::Internal(format!("failed to encode syntax tree: {}", e))
            })?;
            Ok(ParseFileResult {
                ast_json,
                deps: parsed.deps,
                diagnostics: parsed.diagnostics.into_iter().map(Into::into).collect(),
            })
        })
    }

    fn build_program(&self, args: &BuildProgramArgs) -> Result<BuildProgramResult, KonfigError> {
        self.traced("build_program", || {
            let source = Self::source(&args.exec_args.program())?;
            let bytes = self.compiler().build_bytes(&source)?;
            let path = store::persist(Path::new(&args.output), &bytes)?;
            info!(
                self.config.logger,
                target: Phase::Service.target(),
                "wrote artifact {}",
                path.display()
            );
            Ok(BuildProgramResult {
                path: path.display().to_string(),
            })
        })
    }

    fn exec_program(&self, args: &ExecProgramArgs) -> Result<ExecProgramResult, KonfigError> {
        self.traced("exec_program", || {
            let source = Self::source(&args.program())?;
            let compiler = self.compiler();
            if args.fast_eval {
                let compilation = compiler.compile(&source)?;
                return evaluate(
                    &compilation.program,
                    Some(&compilation.files),
                    args,
                    &self.config,
                    self.plugins,
                );
            }

            // same path as artifact execution, minus the file
            let bytes = compiler.build_bytes(&source)?;
            let artifact = decode_artifact(bytes)?;
            debug!(
                self.config.logger,
                target: Phase::Service.target(),
                "executing in-memory artifact for {:?}",
                artifact.metadata.filenames
            );
            let files = artifact.debug_info.as_ref().map(|d| d.files.as_slice());
            evaluate(&artifact.program, files, args, &self.config, self.plugins)
        })
    }

    fn exec_artifact(&self, args: &ExecArtifactArgs) -> Result<ExecProgramResult, KonfigError> {
        self.traced("exec_artifact", || {
            let handle = self.loader.open(&args.path)?;
            let result = handle
                .unit()
                .exec(&args.exec_args, &self.config, self.plugins);
            handle.close();
            result
        })
    }

    fn list_options(&self, args: &ParseProgramArgs) -> Result<ListOptionsResult, KonfigError> {
        self.traced("list_options", || {
            let source = Self::source(args)?;
            let options = self
                .compiler()
                .list_options(&source)?
                .into_iter()
                .map(|option| OptionHelp {
                    name: option.name,
                    ty: option.ty.unwrap_or_default(),
                    required: option.required,
                    default_value: option.default.unwrap_or_default(),
                    help: option.help.unwrap_or_default(),
                })
                .collect();
            Ok(ListOptionsResult { options })
        })
    }
}

/// Release process-wide state at exit
///
/// Loaded artifacts are dropped from the shared registry; handles that are
/// still open keep working until closed.
pub fn shutdown() {
    let loader = ArtifactLoader::global();
    let loaded = loader.loaded_count();
    loader.clear();
    debug!(
        config::config().logger,
        target: Phase::Service.target(),
        "shutdown: released {} loaded artifacts",
        loaded
    );
}
