//! Integration tests for the phasegate CLI
//!
//! These tests drive the binary end to end against a temporary project.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a phasegate Command
fn phasegate() -> Command {
    cargo_bin_cmd!("phasegate")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to run a command inside the project directory
fn run_in(dir: &TempDir, args: &[&str]) -> assert_cmd::assert::Assert {
    phasegate().current_dir(dir.path()).args(args).assert()
}

const DIAMOND: &str = r#"{
  "project": "shop",
  "phases": [
    { "id": "schema", "label": "Database schema" },
    { "id": "api", "label": "API", "depends_on": ["schema"] },
    { "id": "ui", "label": "UI", "depends_on": ["schema"] },
    { "id": "release", "label": "Release", "depends_on": ["api", "ui"] }
  ]
}"#;

/// Helper to initialize and define the diamond project
fn define_project(dir: &TempDir) {
    run_in(dir, &["init"]).success();
    fs::write(dir.path().join("phases.json"), DIAMOND).unwrap();
    run_in(dir, &["define", "phases.json"]).success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        phasegate().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        phasegate().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        run_in(&dir, &["init"])
            .success()
            .stdout(predicate::str::contains("Initialized phasegate project"));

        assert!(dir.path().join(".phasegate").exists());
        assert!(dir.path().join(".phasegate/logs").exists());
        assert!(dir.path().join(".phasegate/phasegate.toml").exists());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        run_in(&dir, &["init"]).success();
        run_in(&dir, &["init"])
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_status_without_project_fails() {
        let dir = create_temp_project();
        run_in(&dir, &["status"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("No project defined"));
    }

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();
        phasegate()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("init")
            .assert()
            .success();
        assert!(dir.path().join(".phasegate").exists());
    }

    #[test]
    fn test_verbose_flag() {
        let dir = create_temp_project();
        run_in(&dir, &["--verbose", "init"]).success();
    }
}

// =============================================================================
// Definition Tests
// =============================================================================

mod definition {
    use super::*;

    #[test]
    fn test_define_and_status() {
        let dir = create_temp_project();
        define_project(&dir);

        run_in(&dir, &["status"])
            .success()
            .stdout(predicate::str::contains("shop"))
            .stdout(predicate::str::contains("schema"))
            .stdout(predicate::str::contains("READY"))
            .stdout(predicate::str::contains("0/4 phases passed"));
    }

    #[test]
    fn test_define_twice_fails() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["define", "phases.json"])
            .failure()
            .stderr(predicate::str::contains("already defined"));
    }

    #[test]
    fn test_define_rejects_cycle_with_exit_one() {
        let dir = create_temp_project();
        run_in(&dir, &["init"]).success();
        fs::write(
            dir.path().join("phases.json"),
            r#"{"phases": [
                {"id": "a", "depends_on": ["c"]},
                {"id": "b", "depends_on": ["a"]},
                {"id": "c", "depends_on": ["b"]}
            ]}"#,
        )
        .unwrap();

        run_in(&dir, &["define", "phases.json"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Cycle detected"));
        assert!(!dir.path().join(".phasegate/project.json").exists());
    }

    #[test]
    fn test_define_rejects_unknown_dependency() {
        let dir = create_temp_project();
        fs::write(
            dir.path().join("phases.json"),
            r#"{"phases": [{"id": "a", "depends_on": ["ghost"]}]}"#,
        )
        .unwrap();

        run_in(&dir, &["define", "phases.json"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("ghost"));
    }

    #[test]
    fn test_plan_prints_waves() {
        let dir = create_temp_project();
        define_project(&dir);

        run_in(&dir, &["plan"])
            .success()
            .stdout(predicate::str::contains("3 wave(s)"))
            .stdout(predicate::str::contains("api, ui"));
    }

    #[test]
    fn test_add_phase_and_dependency() {
        let dir = create_temp_project();
        define_project(&dir);

        run_in(&dir, &["add-phase", "docs", "--depends-on", "api"])
            .success()
            .stdout(predicate::str::contains("PENDING"));
        run_in(&dir, &["add-dependency", "docs", "release"]).success();
        run_in(&dir, &["add-dependency", "release", "docs"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Cycle"));
    }

    #[test]
    fn test_status_json() {
        let dir = create_temp_project();
        define_project(&dir);

        let output = run_in(&dir, &["status", "--json"]).success().get_output().stdout.clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["project"], "shop");
        assert_eq!(json["total"], 4);
        assert_eq!(json["schedulable"][0], "schema");
    }
}

// =============================================================================
// Workflow Tests
// =============================================================================

mod workflow {
    use super::*;

    #[test]
    fn test_full_gate_cycle() {
        let dir = create_temp_project();
        define_project(&dir);

        run_in(&dir, &["assign", "--agent", "alice"])
            .success()
            .stdout(predicate::str::contains("Assigned phase schema to alice (session 1)"));

        run_in(
            &dir,
            &["checkpoint", "schema", "--session", "1", "--usage", "0.4", "--next", "add indexes"],
        )
        .success()
        .stdout(predicate::str::contains("Checkpoint #1"));

        run_in(&dir, &["complete", "schema", "--deliverable", "migrations/001.sql"])
            .success()
            .stdout(predicate::str::contains("round 1"));

        fs::write(
            dir.path().join("findings.json"),
            r#"[{"severity": "blocker", "location": "migrations/001.sql",
                 "description": "missing index"}]"#,
        )
        .unwrap();
        run_in(
            &dir,
            &["review", "schema", "--reviewer", "lead", "--findings", "findings.json"],
        )
        .success()
        .stdout(predicate::str::contains("REVISE"))
        .stdout(predicate::str::contains("schema-R1-F1"));

        run_in(&dir, &["assign", "--agent", "alice"])
            .success()
            .stdout(predicate::str::contains("Resumed phase schema"))
            .stdout(predicate::str::contains("add indexes"));

        run_in(
            &dir,
            &["complete", "schema", "--claims-fixed", "schema-R1-F1"],
        )
        .success();

        run_in(
            &dir,
            &["reverify", "schema", "--reviewer", "lead", "--fixed", "schema-R1-F1"],
        )
        .success()
        .stdout(predicate::str::contains("PASS"))
        .stdout(predicate::str::contains("is now PASSED"));

        run_in(&dir, &["status"])
            .success()
            .stdout(predicate::str::contains("1/4 phases passed"))
            .stdout(predicate::str::contains("Schedulable: api, ui"));
    }

    #[test]
    fn test_forced_checkpoint_and_history() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();

        run_in(
            &dir,
            &["checkpoint", "schema", "--session", "1", "--usage", "0.82", "--next", "resume here"],
        )
        .success()
        .stdout(predicate::str::contains("session yielded"))
        .stdout(predicate::str::contains("continuing in session 2"));

        run_in(&dir, &["history", "schema"])
            .success()
            .stdout(predicate::str::contains("forced"))
            .stdout(predicate::str::contains("resume here"));

        // The yielded session can no longer write checkpoints
        run_in(
            &dir,
            &["checkpoint", "schema", "--session", "1", "--usage", "0.1"],
        )
        .failure()
        .code(2);
    }

    #[test]
    fn test_checkpoint_rejects_bad_usage() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        run_in(
            &dir,
            &["checkpoint", "schema", "--session", "1", "--usage", "1.7"],
        )
        .failure()
        .code(1)
        .stderr(predicate::str::contains("outside"));
    }

    #[test]
    fn test_checkpoint_from_file() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        fs::write(
            dir.path().join("draft.json"),
            r#"{
                "completed_items": ["tables"],
                "decisions": [{"key": "ids", "rationale": "uuid keys"}],
                "resume": {"next_action": "write seeds"}
            }"#,
        )
        .unwrap();

        run_in(
            &dir,
            &["checkpoint", "schema", "--session", "1", "--usage", "0.3", "--file", "draft.json"],
        )
        .success();

        let output = run_in(&dir, &["history", "schema", "--json"])
            .success()
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json[0]["completed_items"][0], "tables");
        assert_eq!(json[0]["resume"]["next_action"], "write seeds");
    }

    #[test]
    fn test_review_on_passed_phase_exits_two() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        run_in(&dir, &["complete", "schema"]).success();
        run_in(&dir, &["review", "schema", "--reviewer", "lead"])
            .success()
            .stdout(predicate::str::contains("PASS"));

        run_in(&dir, &["review", "schema", "--reviewer", "late"])
            .failure()
            .code(2)
            .stderr(predicate::str::contains("Stale review"));
    }

    #[test]
    fn test_blocked_then_reopen() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        run_in(&dir, &["complete", "schema"]).success();
        fs::write(
            dir.path().join("findings.json"),
            r#"[{"severity": "blocker", "location": "infra",
                 "description": "no database credentials", "locally_fixable": false}]"#,
        )
        .unwrap();

        run_in(
            &dir,
            &["review", "schema", "--reviewer", "lead", "--findings", "findings.json"],
        )
        .success()
        .stdout(predicate::str::contains("BLOCKED"));

        run_in(&dir, &["assign", "--agent", "bob"])
            .success()
            .stdout(predicate::str::contains("No phase available"));

        run_in(&dir, &["reopen", "schema"]).success();
        run_in(&dir, &["status", "schema"])
            .success()
            .stdout(predicate::str::contains("READY"))
            .stdout(predicate::str::contains("BLOCKED"));
    }

    #[test]
    fn test_abort_and_invalid_transitions() {
        let dir = create_temp_project();
        define_project(&dir);

        run_in(&dir, &["abort", "api"]).failure().code(2);
        run_in(&dir, &["reopen", "schema"]).failure().code(2);
        run_in(&dir, &["advance", "schema"]).failure().code(2);
        run_in(&dir, &["complete", "schema"]).failure().code(2);

        run_in(&dir, &["abort", "schema"])
            .success()
            .stdout(predicate::str::contains("BLOCKED"));
    }

    #[test]
    fn test_advance_revalidates() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        run_in(&dir, &["complete", "schema"]).success();

        run_in(&dir, &["advance", "schema"])
            .success()
            .stdout(predicate::str::contains("operator"))
            .stdout(predicate::str::contains("is now PASSED"));
    }

    #[test]
    fn test_handoff() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        run_in(
            &dir,
            &["handoff", "schema", "--session", "1", "--next", "finish views"],
        )
        .success()
        .stdout(predicate::str::contains("handed off"));

        run_in(&dir, &["assign", "--agent", "bob"])
            .success()
            .stdout(predicate::str::contains("Resumed phase schema to bob (session 2)"))
            .stdout(predicate::str::contains("finish views"));
    }

    #[test]
    fn test_concurrent_assign_grants_one_session() {
        let dir = create_temp_project();
        define_project(&dir);

        let outputs: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = ["alice", "bob", "carol"]
                .into_iter()
                .map(|agent| {
                    let dir = &dir;
                    s.spawn(move || {
                        let output = run_in(dir, &["assign", "--agent", agent])
                            .success()
                            .get_output()
                            .stdout
                            .clone();
                        String::from_utf8(output).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let assigned = outputs.iter().filter(|o| o.contains("Assigned phase")).count();
        assert_eq!(assigned, 1, "outputs: {:?}", outputs);
        assert!(outputs.iter().all(|o| !o.contains("session 2")));

        let output = run_in(&dir, &["status", "--json"]).success().get_output().stdout.clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["phases"][0]["id"], "schema");
        assert_eq!(json["phases"][0]["sessions"], 1);
    }

    #[test]
    fn test_concurrent_checkpoints_get_distinct_sequences() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();

        std::thread::scope(|s| {
            for n in 0..4 {
                let dir = &dir;
                s.spawn(move || {
                    let next = format!("step {}", n);
                    let args = [
                        "checkpoint",
                        "schema",
                        "--session",
                        "1",
                        "--usage",
                        "0.1",
                        "--next",
                        next.as_str(),
                    ];
                    run_in(dir, &args).success();
                });
            }
        });

        let output = run_in(&dir, &["history", "schema", "--json"])
            .success()
            .get_output()
            .stdout
            .clone();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let sequences: Vec<u64> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unknown_phase() {
        let dir = create_temp_project();
        define_project(&dir);
        run_in(&dir, &["history", "nope"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("not found"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        run_in(&dir, &["config", "show"])
            .success()
            .stdout(predicate::str::contains("No phasegate.toml found"))
            .stdout(predicate::str::contains("usage_ceiling = 0.8"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();
        run_in(&dir, &["config", "init"])
            .success()
            .stdout(predicate::str::contains("Created phasegate.toml"));
        assert!(dir.path().join(".phasegate/phasegate.toml").exists());

        run_in(&dir, &["config", "init"])
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_problems() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".phasegate")).unwrap();
        fs::write(
            dir.path().join(".phasegate/phasegate.toml"),
            "[sessions]\nusage_ceiling = 1.5\n\n[scheduling]\nmax_parallel = 0\n",
        )
        .unwrap();

        run_in(&dir, &["config", "validate"])
            .failure()
            .code(1)
            .stdout(predicate::str::contains("usage_ceiling"))
            .stdout(predicate::str::contains("max_parallel"));
    }

    #[test]
    fn test_config_validate_valid() {
        let dir = create_temp_project();
        run_in(&dir, &["config", "init"]).success();
        run_in(&dir, &["config", "validate"])
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_cli_usage_ceiling_override() {
        let dir = create_temp_project();
        run_in(&dir, &["--usage-ceiling", "0.5", "config", "show"])
            .success()
            .stdout(predicate::str::contains("usage_ceiling = 0.5"));

        define_project(&dir);
        run_in(&dir, &["assign", "--agent", "alice"]).success();
        run_in(
            &dir,
            &["--usage-ceiling", "0.5", "checkpoint", "schema", "--session", "1", "--usage", "0.6"],
        )
        .success()
        .stdout(predicate::str::contains("session yielded"));
    }

    #[test]
    fn test_out_of_range_usage_ceiling_is_rejected() {
        let dir = create_temp_project();
        define_project(&dir);

        run_in(&dir, &["--usage-ceiling", "1.5", "assign", "--agent", "alice"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("usage ceiling"));
        run_in(&dir, &["--usage-ceiling", "0", "status"]).failure().code(1);

        // Nothing was assigned
        run_in(&dir, &["status"])
            .success()
            .stdout(predicate::str::contains("Schedulable: schema"));
    }

    #[test]
    fn test_zero_max_parallel_from_env_is_rejected() {
        let dir = create_temp_project();
        define_project(&dir);

        phasegate()
            .current_dir(dir.path())
            .env("PHASEGATE_MAX_PARALLEL", "0")
            .args(["assign", "--agent", "alice"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("max_parallel"));
    }

    #[test]
    fn test_config_validate_flags_cli_override() {
        let dir = create_temp_project();
        run_in(&dir, &["--usage-ceiling", "1.5", "config", "validate"])
            .failure()
            .code(1)
            .stdout(predicate::str::contains("usage ceiling"));
    }

    #[test]
    fn test_malformed_toml_fails() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".phasegate")).unwrap();
        fs::write(dir.path().join(".phasegate/phasegate.toml"), "[sessions\n").unwrap();
        run_in(&dir, &["status"])
            .failure()
            .code(1)
            .stderr(predicate::str::contains("phasegate.toml"));
    }
}
