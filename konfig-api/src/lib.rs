//! konfig API - build-and-execute service
//!
//! Provides the service surface over `konfig-core`:
//! - [`ServiceClient`] / [`NativeServiceClient`]: parse, build, execute, list options
//! - Artifact store: atomic writes of built artifacts
//! - [`ArtifactHandle`]: reference-counted, shared loading of built artifacts
//! - Unified error handling ([`KonfigError`])
//!
//! One client may be shared by any number of threads. For library use,
//! prefer `NativeServiceClient::with_config`; `NativeServiceClient::new`
//! reads the global configuration installed with [`init_config`].

pub mod config;
pub mod error;
mod exec;
pub mod loader;
pub mod service;
pub mod store;
pub mod types;

pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};
pub use error::{ErrorReport, KonfigError};
pub use loader::{ArtifactHandle, ArtifactLoader, LoadedArtifact};
pub use service::{shutdown, NativeServiceClient, ServiceClient};
pub use types::{
    Argument, BuildProgramArgs, BuildProgramResult, Diagnostic, ExecArtifactArgs,
    ExecProgramArgs, ExecProgramResult, ExecResponse, ListOptionsResult, OptionHelp,
    ParseFileArgs, ParseFileResult, ParseProgramArgs,
};

// Re-export config and runtime types callers need
pub use konfig_config::{CompilerConfig, LazyConfig, LimitConfig, Phase, UnreferencedImports};
pub use konfig_core::runtime::{register_plugin, PluginModule};
pub use konfig_core::Value;
pub use konfig_log::{Level, LogConfig, LogRingBuffer, Logger};
