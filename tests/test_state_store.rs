use std::os::unix::fs::PermissionsExt;

use chrono::Utc;
use node_executor::error::ExecutorError;
use node_executor::state::{
    ContainerRuntimeState, ContainerStatus, DescriptorStore, FileStore, WiredInterface,
};
use tempfile::TempDir;

const DESCRIPTOR: &str = r#"
name: slave1
instance_id: "9"
cluster: cdh
docker_image: registry.local/cdh:5
docker_opts: "--privileged"
cpu: 2
mem: 2048
disks:
  - origin: /data/9/slave1
    destination: /data
    mode: rw
networks:
  - name: eth0
    type: dynamic
    networkname: admin
"#;

#[tokio::test]
async fn test_descriptor_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().to_path_buf());

    store
        .put_descriptor("cluster9/slave1", DESCRIPTOR)
        .await
        .unwrap();

    let descriptor = store.get("cluster9/slave1").await.unwrap();
    assert_eq!(descriptor.container_name(), "9-slave1");
    assert_eq!(descriptor.image, "registry.local/cdh:5");
    assert_eq!(descriptor.extra_options, "--privileged");
    assert_eq!(descriptor.volumes.len(), 1);
    assert_eq!(descriptor.check_ports, vec![22]);

    // Storing a descriptor resets the node
    let state = store.get_runtime_state("cluster9/slave1").await.unwrap();
    assert_eq!(state.status, ContainerStatus::Pending);
    assert!(temp_dir.path().join("cluster9/slave1/descriptor.yaml").exists());
}

#[tokio::test]
async fn test_state_persistence() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().to_path_buf());

    let state = ContainerRuntimeState {
        id: Some("9-slave1".to_string()),
        host: Some("node-a".to_string()),
        namespace_pid: Some(4242),
        status: ContainerStatus::Running,
        interfaces: vec![WiredInterface {
            device: "eth0".to_string(),
            network: "admin".to_string(),
            address: "10.0.0.10".to_string(),
            netmask: "24".to_string(),
            bridge: "br-admin".to_string(),
            gateway: None,
            dynamic: true,
        }],
        last_updated: Utc::now(),
    };

    store
        .set_runtime_state("cluster9/slave1", &state)
        .await
        .unwrap();
    let loaded = store.get_runtime_state("cluster9/slave1").await.unwrap();

    assert_eq!(loaded.id, state.id);
    assert_eq!(loaded.host, state.host);
    assert_eq!(loaded.namespace_pid, Some(4242));
    assert_eq!(loaded.status, ContainerStatus::Running);
    assert_eq!(loaded.interfaces, state.interfaces);

    let path = temp_dir.path().join("cluster9/slave1/state.json");
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(!temp_dir.path().join("cluster9/slave1/state.tmp").exists());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["status"], "running");
}

#[tokio::test]
async fn test_missing_descriptor() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().to_path_buf());

    let err = store.get("cluster9/ghost").await.unwrap_err();
    assert!(matches!(err, ExecutorError::DescriptorNotFound(ref id) if id == "cluster9/ghost"));

    // No state file yet reads as pending
    let state = store.get_runtime_state("cluster9/ghost").await.unwrap();
    assert_eq!(state.status, ContainerStatus::Pending);
    assert!(state.id.is_none());
}

#[tokio::test]
async fn test_rejects_invalid_descriptor_and_paths() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().to_path_buf());

    let no_networks = "name: slave1\ninstance_id: \"9\"\ncluster: cdh\nimage: busybox\ncpu: 1\nmem: 64\n";
    let err = store
        .put_descriptor("cluster9/slave1", no_networks)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidDescriptor { .. }));
    assert!(!temp_dir.path().join("cluster9/slave1/descriptor.yaml").exists());

    let err = store.get("../outside").await.unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidDescriptor { .. }));
}

#[tokio::test]
async fn test_corrupt_state_is_a_store_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path().to_path_buf());

    let dir = temp_dir.path().join("n1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("state.json"), "{not json").unwrap();

    let err = store.get_runtime_state("n1").await.unwrap_err();
    assert!(matches!(err, ExecutorError::Store(_)));
}
