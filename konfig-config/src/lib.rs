//! konfig Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all konfig crates.

use serde::{Deserialize, Serialize};

/// Configuration for compiler behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Whether to emit the debug-info section into built artifacts
    pub emit_debug_info: bool,
    /// Import resolution policy
    pub lazy: LazyConfig,
}

/// How imports whose names are never read are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreferencedImports {
    /// Locate the module but never parse or evaluate it. The program behaves
    /// exactly as if the import were absent.
    #[default]
    Skip,
    /// Resolve every import and run its top-level items (print, assert, ...)
    /// before the entry package.
    Resolve,
}

/// Lazy module resolution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyConfig {
    pub unreferenced_imports: UnreferencedImports,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum nesting depth accepted by the parser
    pub max_recursion_depth: usize,
    /// Maximum evaluator call depth
    pub max_eval_depth: usize,
    /// Maximum length of a list or string built by repetition or `range()`
    pub max_collection_len: usize,
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Lexer,
    Parser,
    Resolver,
    Checker,
    Compiler,
    Loader,
    Runtime,
    Service,
}

impl Phase {
    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Resolver => "resolver",
            Phase::Checker => "checker",
            Phase::Compiler => "compiler",
            Phase::Loader => "loader",
            Phase::Runtime => "runtime",
            Phase::Service => "service",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> &'static str {
        match self {
            Phase::Lexer => "konfig::lexer",
            Phase::Parser => "konfig::parser",
            Phase::Resolver => "konfig::resolver",
            Phase::Checker => "konfig::checker",
            Phase::Compiler => "konfig::compiler",
            Phase::Loader => "konfig::loader",
            Phase::Runtime => "konfig::runtime",
            Phase::Service => "konfig::service",
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
            lazy: LazyConfig::default(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 256,
            max_eval_depth: 512,
            max_collection_len: 1 << 24,
        }
    }
}
