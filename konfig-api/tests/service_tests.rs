//! Service client end-to-end tests

mod common;

use common::{build, client, exec_artifact, v_of, Project, SOURCE_SIMPLE};
use konfig_api::{
    ArtifactHandle, CompilerConfig, ExecProgramArgs, ExecResponse, KonfigError,
    NativeServiceClient, ParseFileArgs, ParseProgramArgs, RunConfig, ServiceClient,
    UnreferencedImports,
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
ok = regex.match(env, "^(dev|prod)$")
print("services", len(services))
"#;

#[test]
fn test_build_and_exec_match_every_mode() {
    let client = client();
    let dir = tempfile::tempdir().unwrap();
    let path = build(&client, dir.path(), SAMPLE).unwrap();

    for env in ["dev", "prod", "qa"] {
        let args = ExecProgramArgs::with_code("source.k", SAMPLE).arg("env", env);
        let fast = client.exec_program(&args.clone().fast_eval(true)).unwrap();
        let compiled = client.exec_program(&args).unwrap();
        let artifact = exec_artifact(&client, &path, ExecProgramArgs::default().arg("env", env)).unwrap();
        assert_eq!(fast, compiled);
        assert_eq!(fast, artifact);
        assert_eq!(artifact.stdout, "services 2\n");
    }

    let result = exec_artifact(&client, &path, ExecProgramArgs::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.json_result).unwrap();
    assert_eq!(json["env"], "dev");
    assert_eq!(json["services"][0]["port"], 8080);
    assert_eq!(json["services"][1]["name"], "db");
    assert_eq!(json["services"][1]["port"], 80);
    assert_eq!(json["ok"], true);
}

#[test]
fn test_build_output_is_the_requested_path() {
    let client = client();
    let dir = tempfile::tempdir().unwrap();
    let path = build(&client, dir.path(), SOURCE_SIMPLE).unwrap();
    assert_eq!(path, dir.path().join("kcl").display().to_string());
    assert!(std::path::Path::new(&path).is_file());
}

#[test]
fn test_build_does_not_replace_an_existing_artifact() {
    let client = client();
    let dir = tempfile::tempdir().unwrap();
    let path = build(&client, dir.path(), SOURCE_SIMPLE).unwrap();
    let before = std::fs::read(&path).unwrap();

    let err = build(&client, dir.path(), "v = 1\n").unwrap_err();
    assert!(matches!(err, KonfigError::Internal(_)), "{err}");
    assert!(err.message().contains("already exists"), "{err}");

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let result = exec_artifact(&client, &path, ExecProgramArgs::default().arg("foo", "3")).unwrap();
    assert_eq!(v_of(&result), 3);
}

#[test]
fn test_failed_build_leaves_no_file() {
    let client = client();
    let project = Project::new();
    let err = build(&client, project.path(), "v = (1 +\n").unwrap_err();
    assert!(matches!(err, KonfigError::Compile(_)), "{err}");
    assert_eq!(err.file(), Some("source.k"));
    assert!(project.entries().is_empty(), "{:?}", project.entries());

    let err = build(&client, project.path(), "v = undefined_name\n").unwrap_err();
    assert_eq!(err.phase(), "checker");
    assert!(project.entries().is_empty());
}

#[test]
fn test_corrupted_artifact_is_load_error() {
    let client = client();
    let dir = tempfile::tempdir().unwrap();
    let path = build(&client, dir.path(), SOURCE_SIMPLE).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let corrupted = dir.path().join("corrupted");
    std::fs::write(&corrupted, &bytes).unwrap();

    let err = exec_artifact(&client, &corrupted.display().to_string(), ExecProgramArgs::default())
        .unwrap_err();
    let report = err.to_report();
    assert_eq!(report.phase, "loader");
    assert_eq!(report.kind, "LoadError::Format");
    assert!(report.file.unwrap().ends_with("corrupted"));

    let truncated = dir.path().join("truncated");
    std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
    let err = exec_artifact(&client, &truncated.display().to_string(), ExecProgramArgs::default())
        .unwrap_err();
    assert!(matches!(err, KonfigError::Load(_)), "{err}");

    // the original artifact still loads
    let result = exec_artifact(&client, &path, ExecProgramArgs::default().arg("foo", "3")).unwrap();
    assert_eq!(v_of(&result), 3);
}

#[test]
fn test_missing_artifact_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing").display().to_string();
    let err = exec_artifact(&client(), &missing, ExecProgramArgs::default()).unwrap_err();
    assert_eq!(err.to_report().kind, "LoadError::Io");
}

#[test]
fn test_option_errors_are_runtime_errors() {
    let client = client();
    let args = ExecProgramArgs::with_code("main.k", "port: int = option(\"port\")\n")
        .arg("port", "abc")
        .fast_eval(true);
    let err = client.exec_program(&args).unwrap_err();
    assert_eq!(err.phase(), "runtime");
    assert!(err.message().contains("option 'port': cannot convert 'abc' to int"), "{err}");

    let args = ExecProgramArgs::with_code("main.k", "key = option(\"key\", required=True)\n");
    let err = client.exec_program(&args).unwrap_err();
    assert!(err.message().contains("option 'key' is required"), "{err}");

    let args = ExecProgramArgs::with_code("main.k", SOURCE_SIMPLE)
        .arg("foo", "1")
        .arg("foo", "2");
    let err = client.exec_program(&args).unwrap_err();
    assert!(matches!(err, KonfigError::Runtime(_)), "{err}");
}

#[test]
fn test_runtime_error_location_survives_artifact() {
    let client = client();
    let dir = tempfile::tempdir().unwrap();
    let path = build(&client, dir.path(), "a = 1\nb = a / option(\"d\")\n").unwrap();
    let err = exec_artifact(&client, &path, ExecProgramArgs::default().arg("d", "0")).unwrap_err();
    assert_eq!(err.file(), Some("source.k"));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_output_flags() {
    let client = client();
    let code = "b = None\na = 1\nc = {z = 1, y = None}\n";
    let args = ExecProgramArgs::with_code("main.k", code).fast_eval(true);

    let plain = client.exec_program(&args).unwrap();
    assert_eq!(plain.json_result, r#"{"b": null, "a": 1, "c": {"z": 1, "y": null}}"#);
    assert!(plain.yaml_result.contains("a: 1"));

    let mut args = args;
    args.disable_none = true;
    args.sort_keys = true;
    args.disable_yaml_result = true;
    let trimmed = client.exec_program(&args).unwrap();
    assert_eq!(trimmed.json_result, r#"{"a": 1, "c": {"z": 1}}"#);
    assert!(trimmed.yaml_result.is_empty());
}

#[test]
fn test_exec_response_envelope() {
    let client = client();
    let ok: ExecResponse = client
        .exec_program(&ExecProgramArgs::with_code("main.k", "a = 1\n"))
        .into();
    assert_eq!(ok.json_result, r#"{"a": 1}"#);
    assert!(ok.err_message.is_empty());

    let err: ExecResponse = client
        .exec_program(&ExecProgramArgs::with_code("main.k", "a = 1 / 0\n"))
        .into();
    assert!(err.json_result.is_empty());
    assert!(err.err_message.contains("division by zero"), "{}", err.err_message);
}

#[test]
fn test_unreferenced_import_side_effects_follow_policy() {
    let project = Project::new();
    project.write("side.k", "print(\"side effect\")\n");
    project.write("main.k", "import side\n\nfoo = 42\n");
    let args = project.exec_args(&["main.k"]).fast_eval(true);

    let skipped = client().exec_program(&args).unwrap();
    assert_eq!(skipped.json_result, r#"{"foo": 42}"#);
    assert_eq!(skipped.stdout, "");

    let mut compiler = CompilerConfig::default();
    compiler.lazy.unreferenced_imports = UnreferencedImports::Resolve;
    let eager = NativeServiceClient::with_config(RunConfig::default().with_compiler(compiler));
    let resolved = eager.exec_program(&args).unwrap();
    assert_eq!(resolved.json_result, r#"{"foo": 42}"#);
    assert_eq!(resolved.stdout, "side effect\n");
}

#[test]
fn test_referenced_import_runs_the_same_under_every_policy() {
    let project = Project::new();
    project.write("main.k", "import lib\nfoo = lib.a\n");
    let args = project.exec_args(&["main.k"]).fast_eval(true);

    let mut compiler = CompilerConfig::default();
    compiler.lazy.unreferenced_imports = UnreferencedImports::Resolve;
    let clients = [
        client(),
        NativeServiceClient::with_config(RunConfig::default().with_compiler(compiler)),
    ];

    project.write("lib.k", "a = 1\nprint(\"lib loaded\")\n");
    for client in &clients {
        let result = client.exec_program(&args).unwrap();
        assert_eq!(result.json_result, r#"{"foo": 1}"#);
        assert_eq!(result.stdout, "lib loaded\n");
    }

    project.write(
        "lib.k",
        "a = 1\nb: int = \"not an int\"\nprint(\"lib loaded\")\nassert False, \"lib invariant\"\n",
    );
    for client in &clients {
        let err = client.exec_program(&args).unwrap_err();
        assert!(matches!(err, KonfigError::Compile(_)), "{err}");
        assert_eq!(err.file(), Some("lib.k"));
        assert_eq!(err.line(), Some(2));
    }

    project.write("lib.k", "a = 1\nassert False, \"lib invariant\"\n");
    for client in &clients {
        let err = client.exec_program(&args).unwrap_err();
        assert!(matches!(err, KonfigError::Runtime(_)), "{err}");
        assert!(err.message().contains("lib invariant"), "{err}");
    }
}

#[test]
fn test_project_on_disk() {
    let project = Project::new();
    project.write("konfig.mod", "[package]\nname = \"app\"\nversion = \"0.1.0\"\n");
    project.write("lib/net.k", "default_port = 8080\n");
    let main = project.write(
        "main.k",
        "import app.lib.net\n\nport = option(\"port\", type=\"int\", default=net.default_port)\n",
    );
    let client = client();

    let mut args = project.exec_args(&[]);
    args.k_filename_list = vec![main.display().to_string()];
    let result = client.exec_program(&args).unwrap();
    assert_eq!(result.json_result, r#"{"port": 8080}"#);

    let result = client.exec_program(&args.clone().arg("port", "9000")).unwrap();
    assert_eq!(result.json_result, r#"{"port": 9000}"#);

    let options = client.list_options(&args.program()).unwrap();
    assert_eq!(options.options.len(), 1);
    assert_eq!(options.options[0].name, "port");
    assert_eq!(options.options[0].ty, "int");
    assert_eq!(options.options[0].default_value, "");
}

#[test]
fn test_parse_file_from_disk_and_errors() {
    let project = Project::new();
    let path = project.write("a.k", "import math\nimport regex\n\nx = math.sqrt(4)\n");
    let client = client();

    let result = client
        .parse_file(&ParseFileArgs {
            path: path.display().to_string(),
            source: None,
        })
        .unwrap();
    assert_eq!(result.deps, vec!["math".to_string(), "regex".to_string()]);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].line, 2);

    let err = client
        .parse_file(&ParseFileArgs {
            path: "bad.k".into(),
            source: Some("x = [1, 2\n".into()),
        })
        .unwrap_err();
    assert_eq!(err.phase(), "parser");
    assert_eq!(err.file(), Some("bad.k"));
}

#[test]
fn test_list_options_with_no_input_is_error() {
    let err = client().list_options(&ParseProgramArgs::default()).unwrap_err();
    assert!(err.message().contains("no input files"), "{err}");
}

#[test]
fn test_handle_reference_counting() {
    let client = client();
    let dir = tempfile::tempdir().unwrap();
    let path = build(&client, dir.path(), SOURCE_SIMPLE).unwrap();

    let first = ArtifactHandle::open(&path).unwrap();
    let second = ArtifactHandle::open(&path).unwrap();
    assert_eq!(first.ref_count(), 2);

    // exec_artifact opens and closes its own reference
    let result = exec_artifact(&client, &path, ExecProgramArgs::default().arg("foo", "5")).unwrap();
    assert_eq!(v_of(&result), 5);
    assert_eq!(first.ref_count(), 2);

    second.close();
    assert_eq!(first.ref_count(), 1);
    let result = first.exec(&ExecProgramArgs::default().arg("foo", "6")).unwrap();
    assert_eq!(v_of(&result), 6);
    drop(first);
}
