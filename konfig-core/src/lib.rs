//! konfig Core - 编译器与求值器（纯逻辑）
//!
//! 包含词法分析、语法分析、惰性模块解析、IR、构建产物格式和求值器。
//! 文件访问统一经过 [`konfig_vfs::VirtualFileSystem`]，配置通过参数
//! 显式传入，不依赖全局状态。

pub mod binary;
pub mod checker;
pub mod compiler;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod runtime;

pub use binary::{decode_artifact, encode_artifact, Artifact, ArtifactMetadata, DebugInfo, WriteOptions, ARTIFACT_EXT};
pub use compiler::{Compilation, Compiler, Diagnostic, OptionInfo, ParsedSource, SourceFile, SourceProgram};
pub use error::{CompileError, Error, LoadError, LoadErrorKind, Result, RuntimeError};
pub use ir::Program;
pub use runtime::{Evaluation, Evaluator, OptionArgs, OutputOptions, PluginRegistry, Value};

pub use konfig_config::{CompilerConfig, LimitConfig, Phase};
