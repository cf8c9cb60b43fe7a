//! 构建产物端到端测试：直接求值与“构建-加载-执行”的结果一致

mod common;

use common::{json_of, run_via_artifact, run_with, source};
use konfig_core::ir::{ExprIr, ItemIr};
use konfig_core::{
    decode_artifact, encode_artifact, CompilerConfig, Compiler, Error, LimitConfig, LoadErrorKind,
    WriteOptions,
};

const SAMPLE: &str = r#"
import regex

schema Service:
    name: str
    port: int = 80
    public?: bool

    check:
        port > 0, "port must be positive"

env = option("env", default="dev")
services = [
    Service {name = "web", port = 8080, public = True}
    Service {name = "db"}
]
ok = regex.search(env, "^(dev|prod)$")
"#;

#[test]
fn test_build_then_execute_matches_direct_evaluation() {
    let compiler = Compiler::default();
    for args in [&[][..], &[("env", "prod")][..]] {
        let direct = json_of(run_with(SAMPLE, args).unwrap());
        let loaded = json_of(run_via_artifact(&compiler, &source(SAMPLE), args).unwrap());
        assert_eq!(direct, loaded);
    }
}

#[test]
fn test_runtime_errors_keep_positions_with_debug_info() {
    let code = "x = 1\ny = x / 0\n";
    let err = run_via_artifact(&Compiler::default(), &source(code), &[]).unwrap_err();
    match err {
        Error::Runtime(e) => {
            assert_eq!(e.file.as_deref(), Some("main.k"));
            assert_eq!(e.line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_runtime_errors_without_debug_info_have_no_file() {
    let config = CompilerConfig {
        emit_debug_info: false,
        ..CompilerConfig::default()
    };
    let compiler = Compiler::new(config, LimitConfig::default());
    let err = run_via_artifact(&compiler, &source("x = 1 / 0\n"), &[]).unwrap_err();
    match err {
        Error::Runtime(e) => {
            assert_eq!(e.file, None);
            assert!(e.message.contains("division by zero"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_metadata() {
    let compiler = Compiler::default();
    let bytes = compiler.build_bytes(&source(SAMPLE)).unwrap();
    let artifact = decode_artifact(bytes).unwrap();
    assert_eq!(artifact.metadata.filenames, vec!["main.k".to_string()]);
    assert_eq!(artifact.metadata.compiler_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(artifact.metadata.source_digest.len(), 64);
    assert!(artifact.metadata.created_at > 0);
}

#[test]
fn test_same_source_gives_same_digest() {
    let compiler = Compiler::default();
    let a = compiler.build(&source(SAMPLE)).unwrap();
    let b = compiler.build(&source(SAMPLE)).unwrap();
    assert_eq!(a.metadata.source_digest, b.metadata.source_digest);
    assert_eq!(a.program, b.program);

    let c = compiler.build(&source("x = 1\n")).unwrap();
    assert_ne!(a.metadata.source_digest, c.metadata.source_digest);
}

#[test]
fn test_corrupted_bytes_are_a_load_error() {
    let mut bytes = Compiler::default().build_bytes(&source(SAMPLE)).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    let err = decode_artifact(bytes).unwrap_err();
    assert!(matches!(err.kind, LoadErrorKind::Format(_)), "{err}");
}

#[test]
fn test_truncated_and_foreign_bytes_are_load_errors() {
    let bytes = Compiler::default().build_bytes(&source(SAMPLE)).unwrap();
    assert!(decode_artifact(bytes[..bytes.len() / 3].to_vec()).is_err());
    assert!(decode_artifact(b"not an artifact at all".to_vec()).is_err());
    assert!(decode_artifact(Vec::new()).is_err());
}

#[test]
fn test_inconsistent_program_is_rejected_on_load() {
    let mut artifact = Compiler::default().build(&source("a = 1\nb = a\n")).unwrap();
    let entry = artifact.program.entry;
    let bindings = &mut artifact.program.packages[entry].bindings;
    bindings[1].value = ExprIr::Global {
        pkg: entry,
        index: 99,
    };
    artifact.program.packages[entry].items.push(ItemIr::Binding(7));

    let bytes = encode_artifact(&artifact, &WriteOptions::default()).unwrap();
    let err = decode_artifact(bytes).unwrap_err();
    assert!(matches!(err.kind, LoadErrorKind::Inconsistent(_)), "{err}");
}
