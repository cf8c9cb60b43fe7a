//! 进程退出前的清理
//!
//! 单独的测试二进制：`shutdown()` 清空全局加载器，不能和其他持有句柄的
//! 测试并发运行。

use konfig::{
    ArtifactHandle, ArtifactLoader, BuildProgramArgs, ExecArtifactArgs, ExecProgramArgs,
    NativeServiceClient, ServiceClient,
};

#[test]
fn test_shutdown_releases_loaded_artifacts() {
    let client = NativeServiceClient::new();
    let dir = tempfile::tempdir().unwrap();
    let path = client
        .build_program(&BuildProgramArgs {
            exec_args: ExecProgramArgs::with_code("source.k", "v = option(\"foo\")\n"),
            output: dir.path().join("kcl").display().to_string(),
        })
        .unwrap()
        .path;

    let handle = ArtifactHandle::open(&path).unwrap();
    assert_eq!(ArtifactLoader::global().loaded_count(), 1);

    konfig::shutdown();
    assert_eq!(ArtifactLoader::global().loaded_count(), 0);

    // 已打开的句柄仍然可用
    let result = handle.exec(&ExecProgramArgs::default().arg("foo", "7")).unwrap();
    assert_eq!(result.json_result, r#"{"v": 7}"#);
    handle.close();
    assert_eq!(ArtifactLoader::global().loaded_count(), 0);

    // 之后的调用重新加载
    let result = client
        .exec_artifact(&ExecArtifactArgs {
            path,
            exec_args: ExecProgramArgs::default().arg("foo", "8"),
        })
        .unwrap();
    assert_eq!(result.json_result, r#"{"v": 8}"#);
    assert_eq!(ArtifactLoader::global().loaded_count(), 0);
}
