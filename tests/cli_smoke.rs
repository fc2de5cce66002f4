use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bracket() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bracket"));
    cmd.env_remove("OPENROUTER_API_KEY")
        .env_remove("OPENROUTER_BASE_URL")
        .env("RUST_LOG", "warn");
    cmd
}

fn write_request(dir: &Path, scores: &[f64]) -> std::path::PathBuf {
    let candidates: Vec<Value> = scores
        .iter()
        .enumerate()
        .map(|(i, s)| json!({ "id": format!("c{i}"), "name": format!("Candidate {i}"), "original_score": s }))
        .collect();
    let path = dir.join("request.json");
    std::fs::write(
        &path,
        serde_json::to_string(&json!({
            "kind": "intent",
            "user_input": "turn the lights off",
            "candidates": candidates
        }))
        .unwrap(),
    )
    .unwrap();
    path
}

fn stdout_json(out: &Output) -> Value {
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn cli_prints_builtin_rubric() {
    let out = bracket().args(["rubric", "--kind", "tool"]).output().unwrap();
    let v = stdout_json(&out);
    assert_eq!(v["name"], "tool_selection");
    let weights: f64 = v["dimensions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["weight"].as_f64().unwrap())
        .sum();
    assert!((weights - 1.0).abs() < 1e-9);
}

#[test]
fn cli_normalizes_and_rejects_rubric_files() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.json");
    std::fs::write(
        &good,
        r#"{"name":"custom","dimensions":[
            {"id":"fit","name":"Fit","weight":0.51,"scoring_criteria":"c"},
            {"id":"cost","name":"Cost","weight":0.51,"scoring_criteria":"c"}]}"#,
    )
    .unwrap();
    let out = bracket()
        .args(["rubric", "--file"])
        .arg(&good)
        .output()
        .unwrap();
    let v = stdout_json(&out);
    assert!((v["dimensions"][0]["weight"].as_f64().unwrap() - 0.5).abs() < 1e-9);

    let bad = dir.path().join("bad.json");
    std::fs::write(
        &bad,
        r#"{"name":"broken","dimensions":[{"id":"fit","name":"Fit","weight":0.3,"scoring_criteria":"c"}]}"#,
    )
    .unwrap();
    let out = bracket()
        .args(["rubric", "--file"])
        .arg(&bad)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn cli_trigger_reports_gate_decision() {
    let dir = tempdir().unwrap();
    let req = write_request(dir.path(), &[0.40, 0.38, 0.37]);
    let out = bracket()
        .args(["trigger", "--request"])
        .arg(&req)
        .output()
        .unwrap();
    let v = stdout_json(&out);
    assert_eq!(v["trigger"], true);
    assert_eq!(v["reason"], "ambiguous");

    let req = write_request(dir.path(), &[0.95, 0.40]);
    let out = bracket()
        .args(["trigger", "--request"])
        .arg(&req)
        .output()
        .unwrap();
    let v = stdout_json(&out);
    assert_eq!(v["trigger"], false);
    assert_eq!(v["reason"], "confident_leader");
}

#[test]
fn cli_run_keeps_top_seed_without_calling_out_when_gate_is_closed() {
    let dir = tempdir().unwrap();
    let req = write_request(dir.path(), &[0.30, 0.80, 0.20]);
    let out_path = dir.path().join("out.json");

    // No API key in the environment: any judge call would fail to construct.
    let status = bracket()
        .args(["run", "--request"])
        .arg(&req)
        .arg("--out")
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());

    let v: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(v["decision"]["reason"], "clear_margin");
    assert_eq!(v["selected_id"], "c1");
    assert!(v["result"].is_null());
}

#[test]
fn cli_rejects_unknown_config_fields() {
    let dir = tempdir().unwrap();
    let req = write_request(dir.path(), &[0.40, 0.38]);
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"tie_epsilon": 0.1, "tie_epsilion": 0.2}"#).unwrap();

    let out = bracket()
        .args(["trigger", "--request"])
        .arg(&req)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_forced_run_against_mock_openrouter_writes_result_and_trace() {
    let server = MockServer::start().await;
    let verdict = json!({
        "scores": {
            "semantic_alignment": 0.8,
            "parameter_coverage": 0.8,
            "domain_match": 0.8,
            "action_type_match": 0.8,
            "ambiguity_resolution": 0.8
        },
        "reasoning": "FIRST reads better"
    });
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": verdict.to_string() }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 10 }
        })))
        .expect(6)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    // Clear margin: only --force makes this run.
    let req = write_request(dir.path(), &[0.70, 0.40, 0.35, 0.30]);
    let out_path = dir.path().join("out.json");
    let trace_path = dir.path().join("trace.jsonl");

    let output = bracket()
        .env("OPENROUTER_API_KEY", "sk-test")
        .env("OPENROUTER_BASE_URL", server.uri())
        .args(["run", "--force", "--request"])
        .arg(&req)
        .arg("--out")
        .arg(&out_path)
        .arg("--trace")
        .arg(&trace_path)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(v["decision"]["trigger"], false);
    // A judge that always favours FIRST ties every match, so seeds decide.
    assert_eq!(v["selected_id"], "c0");
    assert_eq!(v["result"]["llm_calls"], 6);
    assert_eq!(v["result"]["stop_reason"], "completed");
    assert!(v["result"]["matches"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["decided_by"] == "tie_break"));

    let trace = std::fs::read_to_string(&trace_path).unwrap();
    assert_eq!(trace.lines().count(), 3);
}
