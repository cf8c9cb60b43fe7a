//! 测试辅助工具
//!
//! 端到端并发测试共用的源码与辅助函数：构建产物、执行产物、快速求值，
//! 以及带屏障的多线程执行。

#![allow(dead_code)]

use konfig::{
    BuildProgramArgs, ExecArtifactArgs, ExecProgramArgs, ExecProgramResult, NativeServiceClient,
    ParseFileArgs, ServiceClient,
};
use std::path::Path;

pub const THREADS: usize = 10;
pub const ITERATIONS: i64 = 1000;

pub const SOURCE_SIMPLE: &str = r#"
v=option("foo")
"#;

pub const SOURCE_REGEX: &str = r#"
import regex

v=option("foo")
x=regex.match("foo", "^\\w+$")
"#;

pub const SOURCE_PLUGINS: &str = r#"
import konfig_plugin.hello

v=hello.add(option("foo"), 0)
"#;

/// 构建到 `<dir>/kcl`，返回产物路径
pub fn build_program(client: &NativeServiceClient, dir: &Path, source: &str) -> String {
    let result = client
        .build_program(&BuildProgramArgs {
            exec_args: ExecProgramArgs::with_code("source.k", source),
            output: dir.join("kcl").display().to_string(),
        })
        .expect("build_program returns error");
    assert!(!result.path.is_empty());
    result.path
}

pub fn check_parse(client: &NativeServiceClient, source: &str) {
    client
        .parse_file(&ParseFileArgs {
            path: String::new(),
            source: Some(source.to_string()),
        })
        .expect("parse_file returns error");
}

/// 以 `foo=id` 执行产物，检查 `v == id`
pub fn check_execute(client: &NativeServiceClient, path: &str, id: i64) {
    let result = client
        .exec_artifact(&ExecArtifactArgs {
            path: path.to_string(),
            exec_args: ExecProgramArgs::default().arg("foo", id.to_string()),
        })
        .unwrap_or_else(|e| panic!("exec_artifact returns error: {e}"));
    assert_eq!(v_of(&result), id, "{}", result.json_result);
}

/// 以 `foo=id` 快速求值，检查 `v == id`
pub fn check_fast_eval(client: &NativeServiceClient, id: i64, source: &str) {
    let args = ExecProgramArgs::with_code("source.k", source)
        .arg("foo", id.to_string())
        .fast_eval(true);
    let result = client
        .exec_program(&args)
        .unwrap_or_else(|e| panic!("exec_program returns error: {e}"));
    assert_eq!(v_of(&result), id, "{}", result.json_result);
}

pub fn v_of(result: &ExecProgramResult) -> i64 {
    let json: serde_json::Value = serde_json::from_str(&result.json_result)
        .unwrap_or_else(|e| panic!("can't parse configuration {}: {e}", result.json_result));
    json["v"].as_i64().expect("v is an integer")
}

/// 在 `threads` 个线程中运行 `check`，全部结束后返回
pub fn multithread_check<F>(threads: usize, check: F)
where
    F: Fn(usize) + Sync,
{
    std::thread::scope(|scope| {
        for thread in 0..threads {
            let check = &check;
            scope.spawn(move || check(thread));
        }
    });
}
