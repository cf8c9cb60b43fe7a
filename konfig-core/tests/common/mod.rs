//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数：内联代码的编译与执行，以及临时目录中的
//! 多文件项目。

#![allow(dead_code)]

use konfig_core::runtime::{prepare, to_json, OutputOptions};
use konfig_core::{
    decode_artifact, CompilerConfig, Compiler, Error, Evaluation, Evaluator, LimitConfig,
    OptionArgs, PluginRegistry, SourceProgram,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 不存在的工作目录：内联代码不需要磁盘上的任何文件
pub const WORK_DIR: &str = "/konfig-test-nonexistent";

pub fn source(code: &str) -> SourceProgram {
    SourceProgram::new().with_work_dir(WORK_DIR).with_code("main.k", code)
}

/// 编译并直接执行 IR
pub fn run_with(code: &str, args: &[(&str, &str)]) -> Result<Evaluation, Error> {
    let compilation = Compiler::default().compile(&source(code))?;
    let args = OptionArgs::from_pairs(args.iter().copied());
    let plugins = PluginRegistry::with_builtin_plugins();
    let evaluation = Evaluator::new(&compilation.program, &args, &plugins)
        .with_files(&compilation.files)
        .run()?;
    Ok(evaluation)
}

pub fn run(code: &str) -> Result<Evaluation, Error> {
    run_with(code, &[])
}

/// 执行并返回 JSON 结果
pub fn run_json(code: &str) -> String {
    match run(code) {
        Ok(evaluation) => json_of(evaluation),
        Err(e) => panic!("execution failed: {e}\n--- code ---\n{code}"),
    }
}

pub fn json_of(evaluation: Evaluation) -> String {
    let value = prepare(
        konfig_core::Value::Dict(evaluation.result),
        OutputOptions::default(),
    );
    to_json(&value).expect("JSON encoding")
}

/// 执行并返回错误文本
pub fn run_err(code: &str) -> String {
    match run(code) {
        Ok(evaluation) => panic!(
            "expected an error, got {}\n--- code ---\n{code}",
            json_of(evaluation)
        ),
        Err(e) => e.to_string(),
    }
}

/// 先编码为产物字节，再解码执行
pub fn run_via_artifact(compiler: &Compiler, program: &SourceProgram, args: &[(&str, &str)]) -> Result<Evaluation, Error> {
    let bytes = compiler.build_bytes(program)?;
    let artifact = decode_artifact(bytes)?;
    let args = OptionArgs::from_pairs(args.iter().copied());
    let plugins = PluginRegistry::with_builtin_plugins();
    let files = artifact
        .debug_info
        .as_ref()
        .map(|d| d.files.clone())
        .unwrap_or_default();
    let evaluator = Evaluator::new(&artifact.program, &args, &plugins);
    let evaluator = if artifact.debug_info.is_some() {
        evaluator.with_files(&files)
    } else {
        evaluator
    };
    Ok(evaluator.run()?)
}

/// 临时目录中的多文件项目
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

    pub fn program(&self, entries: &[&str]) -> SourceProgram {
        entries.iter().fold(
            SourceProgram::new().with_work_dir(self.dir.path()),
            |program, entry| program.with_file(*entry),
        )
    }

    pub fn run(&self, entries: &[&str]) -> Result<Evaluation, Error> {
        self.run_with(&Compiler::default(), entries)
    }

    pub fn run_with(&self, compiler: &Compiler, entries: &[&str]) -> Result<Evaluation, Error> {
        let compilation = compiler.compile(&self.program(entries))?;
        let args = OptionArgs::new();
        let plugins = PluginRegistry::with_builtin_plugins();
        Ok(Evaluator::new(&compilation.program, &args, &plugins)
            .with_files(&compilation.files)
            .run()?)
    }
}

pub fn resolve_all_compiler() -> Compiler {
    let mut config = CompilerConfig::default();
    config.lazy.unreferenced_imports = konfig_config::UnreferencedImports::Resolve;
    Compiler::new(config, LimitConfig::default())
}
