//! 求值器端到端测试：编译内联代码并直接执行 IR

mod common;

use common::{run, run_err, run_json, run_with};
use konfig_core::{Compiler, Evaluator, OptionArgs, PluginRegistry};

#[test]
fn test_bindings_in_declaration_order() {
    assert_eq!(run_json("b = 2\na = 1\nc = a + b\n"), r#"{"b": 2, "a": 1, "c": 3}"#);
}

#[test]
fn test_private_bindings_are_hidden() {
    assert_eq!(run_json("_tmp = 40\nfoo = _tmp + 2\n"), r#"{"foo": 42}"#);
}

#[test]
fn test_forward_reference() {
    assert_eq!(run_json("a = b * 2\nb = 21\n"), r#"{"a": 42, "b": 21}"#);
}

#[test]
fn test_cyclic_reference() {
    let err = run_err("a = b\nb = a\n");
    assert!(err.contains("cyclic reference to"), "{err}");
    assert!(err.contains("main.k:"), "{err}");
}

#[test]
fn test_arithmetic_and_strings() {
    let json = run_json(
        r#"
a = 7 // 2
b = -7 % 3
c = 1 / 2
d = "ab" * 2 + "c"
e = [1, 2] + [3]
f = {"x": 1} + {"y": 2}
"#,
    );
    assert_eq!(
        json,
        r#"{"a": 3, "b": 2, "c": 0.5, "d": "ababc", "e": [1, 2, 3], "f": {"x": 1, "y": 2}}"#
    );
}

#[test]
fn test_conditional_and_logic() {
    let json = run_json(
        r#"
env = "prod"
replicas = 3 if env == "prod" else 1
debug = env != "prod" and True
name = None or "default"
has = "r" in "prod"
"#,
    );
    assert_eq!(
        json,
        r#"{"env": "prod", "replicas": 3, "debug": false, "name": "default", "has": true}"#
    );
}

#[test]
fn test_short_circuit_skips_errors() {
    assert_eq!(run_json("a = False and 1 / 0\nb = True or 1 / 0\n"), r#"{"a": false, "b": true}"#);
}

#[test]
fn test_division_by_zero_is_located() {
    let err = run_err("x = 1\ny = x / 0\n");
    assert!(err.starts_with("runtime error: main.k:2:"), "{err}");
    assert!(err.contains("division by zero"), "{err}");
}

#[test]
fn test_huge_repetition_is_a_runtime_error() {
    for code in [
        "x = [1, 2] * 9223372036854775807\n",
        "x = \"ab\" * 9223372036854775807\n",
        "x = range(9223372036854775807)\n",
    ] {
        let err = run_err(code);
        assert!(err.starts_with("runtime error: main.k:1:"), "{err}");
        assert!(err.contains("too large"), "{err}");
    }
    assert_eq!(run_json("x = [0] * 3\n"), r#"{"x": [0, 0, 0]}"#);
}

#[test]
fn test_builtins_and_methods() {
    let json = run_json(
        r#"
n = len([1, 2, 3])
s = str(12) + "px"
big = max(3, 9, 4)
total = sum(range(5))
up = "Hello".upper()
parts = "a,b,c".split(",")
msg = "{}-{name}".format(1, name="x")
order = sorted([3, 1, 2], reverse=True)
"#,
    );
    assert_eq!(
        json,
        r#"{"n": 3, "s": "12px", "big": 9, "total": 10, "up": "HELLO", "parts": ["a", "b", "c"], "msg": "1-x", "order": [3, 2, 1]}"#
    );
}

#[test]
fn test_print_is_captured() {
    let evaluation = run("print(\"hello\", 1)\nx = 1\nprint(x, end=\"\")\n").unwrap();
    assert_eq!(evaluation.stdout, "hello 1\n1");
}

#[test]
fn test_assert_failure() {
    let err = run_err("x = 1\nassert x > 1, \"x must be large\"\n");
    assert!(err.contains("main.k:2:"), "{err}");
    assert!(err.contains("assertion failed: x must be large"), "{err}");
}

#[test]
fn test_member_and_index() {
    let json = run_json(
        r#"
conf = {"a": {"b": [10, 20, 30]}}
last = conf.a.b[-1]
missing = conf.nothing
first = "abc"[0]
"#,
    );
    assert_eq!(
        json,
        r#"{"conf": {"a": {"b": [10, 20, 30]}}, "last": 30, "missing": null, "first": "a"}"#
    );
}

#[test]
fn test_index_out_of_range() {
    let err = run_err("xs = [1]\ny = xs[3]\n");
    assert!(err.contains("index 3 out of range"), "{err}");
}

#[test]
fn test_schema_defaults_and_order() {
    let json = run_json(
        r#"
schema Server:
    host: str = "localhost"
    port: int = 80
    tags?: [str]

web = Server {port = 8080}
"#,
    );
    assert_eq!(
        json,
        r#"{"web": {"host": "localhost", "port": 8080, "tags": null}}"#
    );
}

#[test]
fn test_schema_defaults_see_other_attributes() {
    let json = run_json(
        r#"
schema App:
    name: str
    image: str = name + ":latest"

app = App {name = "web"}
"#,
    );
    assert_eq!(json, r#"{"app": {"name": "web", "image": "web:latest"}}"#);
}

#[test]
fn test_schema_required_attribute() {
    let err = run_err(
        r#"
schema App:
    name: str

app = App {}
"#,
    );
    assert!(
        err.contains("attribute 'name' of 'App' is required and can't be None"),
        "{err}"
    );
}

#[test]
fn test_schema_check_block() {
    let code = r#"
schema Deploy:
    replicas: int

    check:
        replicas >= 0, "replicas must be non-negative"

ok = Deploy {replicas = 2}
bad = Deploy {replicas = -1}
"#;
    let err = run_err(code);
    assert!(
        err.contains("check failed for 'Deploy': replicas must be non-negative"),
        "{err}"
    );
    assert!(err.contains("main.k:6:"), "{err}");
}

#[test]
fn test_schema_index_signature_keeps_extra_keys() {
    let json = run_json(
        r#"
schema Labels:
    app: str
    [key: str]: str

l = Labels {team = "core", app = "web"}
"#,
    );
    assert_eq!(json, r#"{"l": {"app": "web", "team": "core"}}"#);
}

#[test]
fn test_int_promoted_to_float() {
    assert_eq!(run_json("ratio: float = 1\n"), r#"{"ratio": 1.0}"#);
}

#[test]
fn test_typed_dict_becomes_schema() {
    let json = run_json(
        r#"
schema Port:
    number: int
    protocol: str = "TCP"

ports: [Port] = [{"number": 80}]
"#,
    );
    assert_eq!(json, r#"{"ports": [{"number": 80, "protocol": "TCP"}]}"#);
}

#[test]
fn test_static_type_mismatch_is_a_compile_error() {
    let err = run_err("x: int = \"abc\"\n");
    assert!(err.starts_with("compile error: main.k:1:1:"), "{err}");
    assert!(err.contains("expected int"), "{err}");
}

#[test]
fn test_undefined_name_is_a_compile_error() {
    let err = run_err("x = y + 1\n");
    assert!(err.contains("name 'y' is not defined"), "{err}");
}

#[test]
fn test_options() {
    let code = r#"
name = option("name", default="app")
port: int = option("port", default=80)
debug = option("debug", type="bool", default=False)
"#;
    let defaults = run_with(code, &[]).unwrap();
    assert_eq!(common::json_of(defaults), r#"{"name": "app", "port": 80, "debug": false}"#);

    let given = run_with(code, &[("port", "8080"), ("debug", "true"), ("name", "web")]).unwrap();
    assert_eq!(common::json_of(given), r#"{"name": "web", "port": 8080, "debug": true}"#);
}

#[test]
fn test_untyped_option_parses_literals() {
    let evaluation = run_with("v = option(\"v\")\n", &[("v", "[1, 2]")]).unwrap();
    assert_eq!(common::json_of(evaluation), r#"{"v": [1, 2]}"#);
    let evaluation = run_with("v = option(\"v\")\n", &[]).unwrap();
    assert_eq!(common::json_of(evaluation), r#"{"v": null}"#);
}

#[test]
fn test_option_errors() {
    let err = run_with("port: int = option(\"port\")\n", &[("port", "abc")])
        .unwrap_err()
        .to_string();
    assert!(err.contains("option 'port': cannot convert 'abc' to int"), "{err}");

    let err = run_with(
        "key = option(\"key\", required=True, help=\"api key\")\n",
        &[],
    )
    .unwrap_err()
    .to_string();
    assert!(
        err.contains("option 'key' is required but was not provided (api key)"),
        "{err}"
    );
}

#[test]
fn test_regex_and_math() {
    let json = run_json(
        r#"
import regex
import math

ok = regex.match("v1.2.3", "^v[0-9]+")
words = regex.findall("a1b22c333", "[0-9]+")
root = math.sqrt(16)
up = math.ceil(1.2)
"#,
    );
    assert_eq!(
        json,
        r#"{"ok": true, "words": ["1", "22", "333"], "root": 4.0, "up": 2}"#
    );
}

#[test]
fn test_plugin_calls() {
    let json = run_json(
        r#"
import konfig_plugin.hello

v = hello.add(40, 2)
s = hello.tolower("ABC")
"#,
    );
    assert_eq!(json, r#"{"v": 42, "s": "abc"}"#);
}

#[test]
fn test_unknown_plugin_is_a_runtime_error() {
    let err = run_err("import konfig_plugin.nothere\n\nv = nothere.f()\n");
    assert!(err.contains("plugin 'nothere' is not registered"), "{err}");
}

#[test]
fn test_deep_reference_chain_hits_the_depth_limit() {
    // x0 依赖 x1，x1 依赖 x2 ...，第一个绑定就要沿整条链求值
    let mut code = String::new();
    for i in 0..100 {
        code.push_str(&format!("x{} = x{} + 1\n", i, i + 1));
    }
    code.push_str("x100 = 0\n");

    let compilation = Compiler::default().compile(&common::source(&code)).unwrap();
    let args = OptionArgs::new();
    let plugins = PluginRegistry::new();
    let err = Evaluator::new(&compilation.program, &args, &plugins)
        .with_max_depth(64)
        .run()
        .unwrap_err();
    assert_eq!(err.message, "maximum evaluation depth 64 exceeded");
    assert_eq!(err.file, None);

    let evaluation = Evaluator::new(&compilation.program, &args, &plugins)
        .with_max_depth(512)
        .run()
        .unwrap();
    assert_eq!(evaluation.result.get("x0"), Some(&konfig_core::Value::Int(100)));
}
