//! Service argument and result types
//!
//! These mirror the logical RPC surface and are plain serde structs, so a
//! transport layer can encode them however it likes.

use crate::error::KonfigError;
use serde::{Deserialize, Serialize};

/// A named runtime argument for `option()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseFileArgs {
    pub path: String,
    /// Parsed instead of the file at `path` when present
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFileResult {
    /// Syntax tree as JSON
    pub ast_json: String,
    /// Import paths in source order
    pub deps: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A non-fatal message produced while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl From<konfig_core::Diagnostic> for Diagnostic {
    fn from(d: konfig_core::Diagnostic) -> Self {
        Self {
            file: d.file,
            line: d.line,
            column: d.column,
            message: d.message,
        }
    }
}

/// Source selection shared by every program-level operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseProgramArgs {
    pub work_dir: Option<String>,
    pub k_filename_list: Vec<String>,
    /// Inline code for the filename at the same index
    pub k_code_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecProgramArgs {
    pub work_dir: Option<String>,
    pub k_filename_list: Vec<String>,
    pub k_code_list: Vec<String>,
    pub args: Vec<Argument>,
    /// Evaluate the program directly instead of going through an artifact
    pub fast_eval: bool,
    pub disable_yaml_result: bool,
    /// Drop `None` values from the result
    pub disable_none: bool,
    pub sort_keys: bool,
}

impl ExecProgramArgs {
    /// Inline program with a single file
    pub fn with_code(filename: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            k_filename_list: vec![filename.into()],
            k_code_list: vec![code.into()],
            ..Self::default()
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(Argument::new(name, value));
        self
    }

    pub fn fast_eval(mut self, fast_eval: bool) -> Self {
        self.fast_eval = fast_eval;
        self
    }

    pub fn program(&self) -> ParseProgramArgs {
        ParseProgramArgs {
            work_dir: self.work_dir.clone(),
            k_filename_list: self.k_filename_list.clone(),
            k_code_list: self.k_code_list.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecProgramResult {
    pub json_result: String,
    /// Empty when `disable_yaml_result` is set
    pub yaml_result: String,
    /// Output of `print`
    pub stdout: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildProgramArgs {
    pub exec_args: ExecProgramArgs,
    /// Path of the artifact to write
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProgramResult {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecArtifactArgs {
    pub path: String,
    /// Only the argument and output flags are used
    pub exec_args: ExecProgramArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionHelp {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub required: bool,
    pub default_value: String,
    pub help: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptionsResult {
    pub options: Vec<OptionHelp>,
}

/// RPC envelope for an execution result; never carries both fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResponse {
    pub json_result: String,
    pub err_message: String,
}

impl From<Result<ExecProgramResult, KonfigError>> for ExecResponse {
    fn from(result: Result<ExecProgramResult, KonfigError>) -> Self {
        match result {
            Ok(result) => Self {
                json_result: result.json_result,
                err_message: String::new(),
            },
            Err(err) => Self {
                json_result: String::new(),
                err_message: err.to_string(),
            },
        }
    }
}
