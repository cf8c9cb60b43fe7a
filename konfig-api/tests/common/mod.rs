//! Shared helpers for service-level tests

#![allow(dead_code)]

use konfig_api::{
    BuildProgramArgs, ExecArtifactArgs, ExecProgramArgs, ExecProgramResult, KonfigError,
    NativeServiceClient, RunConfig, ServiceClient,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SOURCE_SIMPLE: &str = "\nv=option(\"foo\")\n";

pub fn client() -> NativeServiceClient {
    NativeServiceClient::with_config(RunConfig::default())
}

/// Build `source` as `source.k` into `<dir>/kcl`
pub fn build(client: &NativeServiceClient, dir: &Path, source: &str) -> Result<String, KonfigError> {
    client
        .build_program(&BuildProgramArgs {
            exec_args: ExecProgramArgs::with_code("source.k", source),
            output: dir.join("kcl").display().to_string(),
        })
        .map(|result| result.path)
}

pub fn exec_artifact(
    client: &NativeServiceClient,
    path: &str,
    args: ExecProgramArgs,
) -> Result<ExecProgramResult, KonfigError> {
    client.exec_artifact(&ExecArtifactArgs {
        path: path.to_string(),
        exec_args: args,
    })
}

/// Value of the `v` key of a JSON result
pub fn v_of(result: &ExecProgramResult) -> i64 {
    let json: serde_json::Value =
        serde_json::from_str(&result.json_result).expect("result is JSON");
    json["v"].as_i64().expect("v is an integer")
}

/// On-disk project in a temporary directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write source file");
        path
    }

    pub fn exec_args(&self, entries: &[&str]) -> ExecProgramArgs {
        ExecProgramArgs {
            work_dir: Some(self.path().display().to_string()),
            k_filename_list: entries.iter().map(|e| e.to_string()).collect(),
            ..ExecProgramArgs::default()
        }
    }

    /// Names of the files directly inside the project directory
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .expect("read project dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
