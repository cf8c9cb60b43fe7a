//! 运行时：值、运算符、内置函数、系统模块、插件与求值器
//!
//! ```text
//! Program ──> Evaluator ──> Evaluation { result, stdout }
//!               │  │  └── PluginRegistry (konfig_plugin.*)
//!               │  └───── regex / math
//!               └──────── OptionArgs (option() 参数)
//! ```

mod builtins;
mod eval;
mod operators;
mod options;
mod output;
mod plugin;
mod system;
mod value;

pub use builtins::Args;
pub use eval::{Evaluation, Evaluator};
pub use options::{coerce, parse_literal, OptionArgs};
pub use output::{prepare, to_json, to_yaml, OutputOptions};
pub use plugin::{global_plugins, register_plugin, PluginFn, PluginModule, PluginRegistry};
pub use value::{Dict, SchemaValue, Value};
