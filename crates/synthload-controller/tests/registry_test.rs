//! Registry persistence tests.

use synthload_controller::AgentRegistry;

#[tokio::test]
async fn add_and_remove_round_trip_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = AgentRegistry::load(dir.path()).unwrap();

    registry.add("agent-a", "http://10.0.0.1:9101").await;
    registry.add("agent-b", "http://10.0.0.2:9101").await;

    let path = dir.path().join("agents.json");
    let file: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let agents = file["agents"].as_object().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents["agent-a"]["url"], "http://10.0.0.1:9101");
    assert_eq!(agents["agent-a"]["is_healthy"], false);
    assert!(agents["agent-a"]["last_seen"].is_string());

    registry.remove("agent-a").await;
    registry.remove("agent-b").await;

    let file: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(file["agents"].as_object().unwrap().len(), 0);
}

#[tokio::test]
async fn reload_preserves_records_and_resets_health() {
    let dir = tempfile::tempdir().unwrap();

    {
        let registry = AgentRegistry::load(dir.path()).unwrap();
        registry.add("agent-a", "http://10.0.0.1:9101").await;
    }

    // Simulate a probe having marked the agent healthy before the
    // controller went down.
    let path = dir.path().join("agents.json");
    let mut file: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    file["agents"]["agent-a"]["is_healthy"] = serde_json::Value::Bool(true);
    std::fs::write(&path, serde_json::to_vec_pretty(&file).unwrap()).unwrap();

    let restarted = AgentRegistry::load(dir.path()).unwrap();
    let record = restarted.get("agent-a").await.expect("record survived restart");
    assert_eq!(record.url, "http://10.0.0.1:9101");
    assert!(!record.is_healthy, "health must reset until the next probe");
}

#[tokio::test]
async fn missing_file_is_an_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = AgentRegistry::load(dir.path().join("nested")).unwrap();
    assert!(registry.list().await.is_empty());

    // First mutation creates the directory and the file.
    registry.add("agent-a", "http://10.0.0.1:9101").await;
    assert!(dir.path().join("nested").join("agents.json").exists());
}

#[tokio::test]
async fn corrupt_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("agents.json"), b"{oops").unwrap();
    assert!(AgentRegistry::load(dir.path()).is_err());
}
