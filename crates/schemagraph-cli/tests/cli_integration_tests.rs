//! CLI integration tests for schemagraph
//!
//! Runs the schemagraph binary end-to-end against a throwaway data directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Command bound to an isolated data directory and config file
#[allow(deprecated)]
fn schemagraph_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("schemagraph").unwrap();
    cmd.env("SCHEMAGRAPH_CONFIG", dir.path().join("config.toml"));
    cmd.env("SCHEMAGRAPH_DATA_DIR", dir.path().join("data"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn demo_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/agentforge.json")
}

/// Fresh store with the software_project preset and the AgentForge demo loaded
fn seeded() -> TempDir {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir)
        .args(["schema", "init"])
        .assert()
        .success();
    schemagraph_cmd(&dir)
        .arg("import")
        .arg(demo_file())
        .assert()
        .success()
        .stdout(predicate::str::contains("Entities created: 9"))
        .stdout(predicate::str::contains("Relationships created: 8"));
    dir
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_schema_init_and_list() {
    let dir = TempDir::new().unwrap();

    schemagraph_cmd(&dir)
        .args(["schema", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registered 3 entity types, 3 relationship types"));

    // A second init skips the identical types
    schemagraph_cmd(&dir)
        .args(["schema", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registered 0 entity types"));

    schemagraph_cmd(&dir)
        .args(["schema", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("software_project"))
        .stdout(predicate::str::contains("component -> component"));
}

#[test]
fn test_schema_show_entity_type() {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir).args(["schema", "init"]).assert().success();

    schemagraph_cmd(&dir)
        .args(["schema", "show", "feature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entity type: feature"))
        .stdout(predicate::str::contains("in_progress"));

    schemagraph_cmd(&dir)
        .args(["schema", "show", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No entity or relationship type named 'nothing'"));
}

#[test]
fn test_register_custom_types() {
    let dir = TempDir::new().unwrap();

    schemagraph_cmd(&dir)
        .args([
            "schema",
            "register-entity",
            "service",
            "--field",
            "tier:enum=gold|silver:required",
            "--field",
            "owners:array<string>",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered entity type: service"));

    schemagraph_cmd(&dir)
        .args([
            "schema",
            "register-relationship",
            "calls",
            "--source",
            "service",
            "--target",
            "service",
        ])
        .assert()
        .success();

    schemagraph_cmd(&dir)
        .args(["schema", "register-entity", "service"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Type already registered: service"));

    schemagraph_cmd(&dir)
        .args(["entity", "add", "billing", "--type", "service"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field 'tier'"));

    schemagraph_cmd(&dir)
        .args(["entity", "add", "billing", "--type", "service", "--field", "tier=gold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created entity: billing (type: service)"));
}

#[test]
fn test_entity_validation_errors() {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir).args(["schema", "init"]).assert().success();

    schemagraph_cmd(&dir)
        .args(["entity", "add", "Widget", "--type", "widget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown entity type referenced: widget"));

    schemagraph_cmd(&dir)
        .args([
            "entity", "add", "Search", "--type", "feature", "--field", "status=shipping",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'shipping'"));

    schemagraph_cmd(&dir)
        .args(["entity", "add", "Core", "--type", "component", "--field", "dependencies=3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("field 'dependencies' expected array"));

    // Nothing was written by the failed attempts
    schemagraph_cmd(&dir)
        .args(["entity", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entities found"));
}

#[test]
fn test_entity_get_update_and_find() {
    let dir = seeded();

    schemagraph_cmd(&dir)
        .args(["entity", "get", "AgentForge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Type: software_project"))
        .stdout(predicate::str::contains("framework: Next.js"));

    schemagraph_cmd(&dir)
        .args(["entity", "update", "AgentForge", "--field", "version=0.6.0"])
        .assert()
        .success();

    let entity = json_stdout(
        schemagraph_cmd(&dir).args(["--format", "json", "entity", "get", "AgentForge"]),
    );
    assert_eq!(entity["metadata"]["version"], "0.6.0");
    assert_eq!(entity["metadata"]["license"], "MIT");

    schemagraph_cmd(&dir)
        .args(["entity", "update", "AgentForge", "--field", "status=retired"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'retired'"));

    schemagraph_cmd(&dir)
        .args(["entity", "find", "--type", "component", "--field", "dependencies=Prisma"])
        .assert()
        .success()
        .stdout(predicate::str::contains("API Routes"))
        .stdout(predicate::str::contains("Frontend App").not());

    schemagraph_cmd(&dir)
        .args(["entity", "list", "--type", "feature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 entities"));
}

#[test]
fn test_relationship_endpoint_types_enforced() {
    let dir = seeded();

    schemagraph_cmd(&dir)
        .args([
            "relationship",
            "add",
            "API Routes",
            "Feed System",
            "--type",
            "has_feature",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "source entity must be of type software_project, got component",
        ));

    schemagraph_cmd(&dir)
        .args(["relationship", "add", "AgentForge", "Ghost", "--type", "has_feature"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Entity not found: Ghost"));
}

#[test]
fn test_relationship_supersede_once() {
    let dir = seeded();

    let rel = json_stdout(schemagraph_cmd(&dir).args([
        "--format",
        "json",
        "relationship",
        "add",
        "MCP Integration",
        "API Routes",
        "--type",
        "depends_on",
        "--fact",
        "MCP tools are served through the API",
        "--valid-from",
        "2024-01-01",
    ]));
    let id = rel["id"].as_str().unwrap().to_string();
    assert!(rel.get("valid_to").is_none() || rel["valid_to"].is_null());

    schemagraph_cmd(&dir)
        .args(["relationship", "supersede", &id, "--valid-to", "2024-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Superseded relationship"));

    schemagraph_cmd(&dir)
        .args(["relationship", "supersede", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already closed"));

    // Still visible at a past instant, gone from the current view
    schemagraph_cmd(&dir)
        .args(["relationship", "list", "--source", "MCP Integration", "--as-of", "2024-03-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));

    schemagraph_cmd(&dir)
        .args(["relationship", "list", "--source", "MCP Integration", "--current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No relationships found"));
}

#[test]
fn test_supersede_before_valid_from_rejected() {
    let dir = seeded();

    let rel = json_stdout(schemagraph_cmd(&dir).args([
        "--format",
        "json",
        "relationship",
        "add",
        "MCP Integration",
        "Workflow Engine",
        "--type",
        "depends_on",
        "--valid-from",
        "2024-06-01",
    ]));
    let id = rel["id"].as_str().unwrap();

    schemagraph_cmd(&dir)
        .args(["relationship", "supersede", id, "--valid-to", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid time range"));
}

#[test]
fn test_traverse_and_path() {
    let dir = seeded();
    for (from, to) in [
        ("Frontend App", "API Routes"),
        ("API Routes", "Workflow Engine"),
        ("Workflow Engine", "MCP Integration"),
    ] {
        schemagraph_cmd(&dir)
            .args(["relationship", "add", from, to, "--type", "depends_on"])
            .assert()
            .success();
    }

    schemagraph_cmd(&dir)
        .args(["traverse", "AgentForge", "--depth", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow Builder"))
        .stdout(predicate::str::contains("MCP Integration"))
        .stdout(predicate::str::contains("9 entities"));

    schemagraph_cmd(&dir)
        .args([
            "traverse",
            "Frontend App",
            "--relationship-types",
            "depends_on",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow Engine"))
        .stdout(predicate::str::contains("AgentForge").not());

    schemagraph_cmd(&dir)
        .args(["path", "Frontend App", "MCP Integration"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(3 hops)"));

    schemagraph_cmd(&dir)
        .args(["path", "MCP Integration", "Frontend App"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No path"));

    schemagraph_cmd(&dir)
        .args(["path", "MCP Integration", "Frontend App", "--direction", "incoming"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(3 hops)"));
}

#[test]
fn test_import_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir).args(["schema", "init"]).assert().success();

    let bad = dir.path().join("bad.json");
    std::fs::write(
        &bad,
        r#"{
            "entities": [
                {"entity_type": "feature", "name": "Search"},
                {"entity_type": "feature", "name": "Sync", "metadata": {"priority": "urgent"}}
            ]
        }"#,
    )
    .unwrap();

    schemagraph_cmd(&dir)
        .arg("import")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'urgent'"));

    schemagraph_cmd(&dir)
        .args(["entity", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entities found"));
}

#[test]
fn test_export_writes_graph_document() {
    let dir = seeded();
    let out = dir.path().join("graph.json");

    schemagraph_cmd(&dir)
        .args(["export", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported to"));

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(document["schema"]["entity_types"].as_array().unwrap().len(), 3);
    assert_eq!(document["entities"].as_array().unwrap().len(), 9);
    assert_eq!(document["relationships"].as_array().unwrap().len(), 8);
}

#[test]
fn test_export_import_round_trip() {
    let dir = seeded();
    let out = dir.path().join("graph.json");
    schemagraph_cmd(&dir)
        .args(["export", "--output"])
        .arg(&out)
        .assert()
        .success();

    let copy = TempDir::new().unwrap();
    schemagraph_cmd(&copy)
        .arg("import")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Entity types registered: 3"))
        .stdout(predicate::str::contains("Entities created: 9"))
        .stdout(predicate::str::contains("Relationships created: 8"));

    let original = json_stdout(schemagraph_cmd(&dir).arg("export"));
    let restored = json_stdout(schemagraph_cmd(&copy).arg("export"));
    assert_eq!(original, restored);

    // Ids already present are refused
    schemagraph_cmd(&copy)
        .arg("import")
        .arg(&out)
        .assert()
        .failure();
}

#[test]
fn test_import_links_component_dependencies() {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir).args(["schema", "init"]).assert().success();

    let doc = dir.path().join("components.json");
    std::fs::write(
        &doc,
        r#"{
            "entities": [
                {"entity_type": "component", "name": "API Routes",
                 "metadata": {"dependencies": ["Workflow Engine", "Prisma"]}},
                {"entity_type": "component", "name": "Workflow Engine",
                 "metadata": {"dependencies": ["LangChain"]}}
            ]
        }"#,
    )
    .unwrap();

    schemagraph_cmd(&dir)
        .args(["import", "--link-dependencies"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("Relationships created: 1"));

    schemagraph_cmd(&dir)
        .args(["path", "API Routes", "Workflow Engine"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-->[depends_on] Workflow Engine"));
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();

    schemagraph_cmd(&dir)
        .args(["config", "set", "format", "json"])
        .assert()
        .success();

    schemagraph_cmd(&dir)
        .args(["config", "get", "format"])
        .assert()
        .success()
        .stdout(predicate::str::contains("json"));

    schemagraph_cmd(&dir)
        .args(["config", "set", "format", "xml"])
        .assert()
        .failure();

    schemagraph_cmd(&dir)
        .args(["config", "get", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No config key named"));
}

#[test]
fn test_config_format_applies_to_commands() {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir)
        .args(["config", "set", "format", "json"])
        .assert()
        .success();
    schemagraph_cmd(&dir).args(["schema", "init"]).assert().success();

    let schema = json_stdout(schemagraph_cmd(&dir).args(["schema", "list"]));
    assert_eq!(schema["relationship_types"].as_array().unwrap().len(), 3);
}

#[test]
fn test_completions_generate() {
    let dir = TempDir::new().unwrap();
    schemagraph_cmd(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("schemagraph"));
}
