use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use treeforge_cli::commands::build;
use treeforge_cli::commands::cli::BuildArgs;
use treeforge_cli::error::CliError;
use treeforge_core::api::TreeforgeConfig;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn config_in(scratch: &Path) -> TreeforgeConfig {
    let mut cfg = TreeforgeConfig::default();
    cfg.builder.temp_root = Some(scratch.display().to_string());
    cfg
}

#[tokio::test]
async fn merges_modern_and_legacy_units_into_the_output() {
    let project = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let out = project.path().join("dist");
    write(&project.path().join("app/index.js"), "app");
    write(&project.path().join("vendor/js/lib.js"), "lib");
    write(&project.path().join("public/robots.txt"), "robots");
    write(
        &project.path().join("Treeforgefile.toml"),
        r#"
root = "dist"

[[units]]
id = "vendor"
kind = "legacy-merge"
inputs = ["vendor/js"]

[[units]]
id = "dist"
kind = "merge"
inputs = ["app", "vendor", "public"]
"#,
    );

    let args = BuildArgs {
        manifest: project.path().join("Treeforgefile.toml"),
        out: Some(out.clone()),
        changed: vec!["app/index.js".into()],
        graph_json: Some(project.path().join("graph.json")),
    };
    let code = build::run(args, &config_in(scratch.path())).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(out.join("index.js")).unwrap(), "app");
    assert_eq!(fs::read_to_string(out.join("lib.js")).unwrap(), "lib");
    assert_eq!(fs::read_to_string(out.join("robots.txt")).unwrap(), "robots");

    let graph: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(project.path().join("graph.json")).unwrap())
            .unwrap();
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 5);

    // Scratch directories are gone once the command returns.
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn cyclic_manifest_fails_the_build() {
    let project = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write(
        &project.path().join("Treeforgefile.toml"),
        r#"
root = "a"

[[units]]
id = "a"
kind = "merge"
inputs = ["b"]

[[units]]
id = "b"
kind = "merge"
inputs = ["a"]
"#,
    );

    let args = BuildArgs {
        manifest: project.path().join("Treeforgefile.toml"),
        out: None,
        changed: Vec::new(),
        graph_json: None,
    };
    let err = build::run(args, &config_in(scratch.path())).await.unwrap_err();
    assert!(matches!(err, CliError::Build(_)), "{err}");
    assert_eq!(err.exit_code(), 20);
}

#[tokio::test]
async fn missing_manifest_is_a_manifest_error() {
    let scratch = tempfile::tempdir().unwrap();
    let args = BuildArgs {
        manifest: scratch.path().join("absent.toml"),
        out: None,
        changed: Vec::new(),
        graph_json: None,
    };
    let err = build::run(args, &config_in(scratch.path())).await.unwrap_err();
    assert_eq!(err.exit_code(), 11);
}
