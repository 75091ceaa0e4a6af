// Common test utilities: in-memory fakes for every orchestrator seam
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use node_executor::config::ReadinessConfig;
use node_executor::descriptor::NodeDescriptor;
use node_executor::discovery::{ServiceRegistrar, ServiceRegistration};
use node_executor::error::{ExecutorError, Result};
use node_executor::network::{AddressAllocator, InterfaceWiring, NetworkInfo};
use node_executor::runtime::{ContainerRuntime, RunMode};
use node_executor::state::{ContainerRuntimeState, ContainerStatus, DescriptorStore, WiredInterface};
use node_executor::Orchestrator;

pub const NODE_ID: &str = "cluster9/slave1";
pub const CONTAINER: &str = "9-slave1";

/// Two dynamic interfaces
pub const TWO_DYNAMIC: &str = r#"
name: slave1
instance_id: "9"
cluster: cdh
image: busybox
cpu: 1
mem: 512
networks:
  - name: eth0
    networkname: admin
  - name: eth1
    networkname: storage
tags: "yarn,hdfs"
check_ports: "22,5000"
"#;

/// One static interface with everything resolved locally
pub const ONE_STATIC: &str = r#"
name: slave1
instance_id: "9"
cluster: cdh
image: busybox
cpu: 1
mem: 512
networks:
  - name: eth0
    type: static
    networkname: admin
    address: 10.10.0.7
    bridge: br-admin
    netmask: "24"
    gateway: 10.10.0.1
"#;

/// Ordered record of every side effect, shared by all fakes
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.all().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.all().iter().position(|c| c == call)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

// ---------------------------------------------------------------------------
// Store

#[derive(Default)]
pub struct MemoryStore {
    pub descriptors: Mutex<HashMap<String, NodeDescriptor>>,
    pub states: Mutex<HashMap<String, ContainerRuntimeState>>,
    /// Every status ever written, in order
    pub history: Mutex<Vec<ContainerStatus>>,
}

impl MemoryStore {
    pub fn with_descriptor(node_id: &str, yaml: &str) -> Self {
        let store = Self::default();
        let descriptor = NodeDescriptor::from_yaml(node_id, yaml).unwrap();
        store
            .descriptors
            .lock()
            .unwrap()
            .insert(node_id.to_string(), descriptor);
        store
    }

    pub fn state(&self, node_id: &str) -> ContainerRuntimeState {
        self.states
            .lock()
            .unwrap()
            .get(node_id)
            .cloned()
            .unwrap_or_else(ContainerRuntimeState::pending)
    }

    pub fn history(&self) -> Vec<ContainerStatus> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DescriptorStore for MemoryStore {
    async fn get(&self, node_id: &str) -> Result<NodeDescriptor> {
        self.descriptors
            .lock()
            .unwrap()
            .get(node_id)
            .cloned()
            .ok_or_else(|| ExecutorError::DescriptorNotFound(node_id.to_string()))
    }

    async fn get_runtime_state(&self, node_id: &str) -> Result<ContainerRuntimeState> {
        Ok(self.state(node_id))
    }

    async fn set_runtime_state(&self, node_id: &str, state: &ContainerRuntimeState) -> Result<()> {
        self.history.lock().unwrap().push(state.status);
        self.states
            .lock()
            .unwrap()
            .insert(node_id.to_string(), state.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime

pub struct FakeRuntime {
    pub calls: Calls,
    pub running: AtomicBool,
    pub exists: AtomicBool,
    pub fail_pull: bool,
    pub fail_run: bool,
    pub fail_remove: bool,
    /// How long a foreground run stays attached before the container exits
    pub foreground_lifetime: Duration,
}

impl FakeRuntime {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            running: AtomicBool::new(false),
            exists: AtomicBool::new(false),
            fail_pull: false,
            fail_run: false,
            fail_remove: false,
            foreground_lifetime: Duration::from_millis(200),
        }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn pull(&self, image: &str) -> Result<()> {
        self.calls.push(format!("pull {}", image));
        if self.fail_pull {
            return Err(ExecutorError::ImagePull {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, descriptor: &NodeDescriptor, mode: RunMode) -> Result<()> {
        let name = descriptor.container_name();
        self.calls.push(format!("run {}", name));
        if self.fail_run {
            return Err(ExecutorError::RuntimeStart {
                container: name,
                reason: "port is already allocated".to_string(),
            });
        }
        self.exists.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        if mode == RunMode::Foreground {
            let deadline = tokio::time::Instant::now() + self.foreground_lifetime;
            while tokio::time::Instant::now() < deadline {
                if !self.running.load(Ordering::SeqCst) {
                    // Stopped from outside, like `docker stop` ending an attached run
                    self.calls.push(format!("killed {}", name));
                    return Err(ExecutorError::RuntimeStart {
                        container: name,
                        reason: "container exited with exit status: 143".to_string(),
                    });
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.running.store(false, Ordering::SeqCst);
            self.calls.push(format!("exited {}", name));
        }
        Ok(())
    }

    async fn namespace_pid(&self, _name: &str) -> Result<Option<u32>> {
        // Our own pid passes the liveness check
        Ok(self
            .running
            .load(Ordering::SeqCst)
            .then(std::process::id))
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.calls.push(format!("stop {}", name));
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.calls.push(format!("remove {}", name));
        if self.fail_remove {
            return Err(ExecutorError::RuntimeRemove {
                container: name.to_string(),
                reason: "device or resource busy".to_string(),
            });
        }
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Allocator

pub struct FakeAllocator {
    pub calls: Calls,
    pub next: Mutex<u8>,
    pub allocated: Mutex<HashSet<String>>,
    /// Network that has no free addresses left
    pub exhausted: Option<String>,
    pub fail_deallocate: bool,
}

impl FakeAllocator {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            next: Mutex::new(10),
            allocated: Mutex::new(HashSet::new()),
            exhausted: None,
            fail_deallocate: false,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.allocated.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl AddressAllocator for FakeAllocator {
    async fn network_info(&self, network: &str) -> Result<NetworkInfo> {
        self.calls.push(format!("info {}", network));
        Ok(NetworkInfo {
            bridge: format!("br-{}", network),
            netmask: "24".to_string(),
            gateway: Some("10.0.0.1".to_string()),
        })
    }

    async fn allocate(&self, network: &str, node: &str, cluster: &str) -> Result<String> {
        self.calls
            .push(format!("allocate {} {} {}", network, node, cluster));
        if self.exhausted.as_deref() == Some(network) {
            return Err(ExecutorError::AllocationExhausted {
                network: network.to_string(),
            });
        }
        let mut next = self.next.lock().unwrap();
        let address = format!("10.0.0.{}", *next);
        *next += 1;
        self.allocated.lock().unwrap().insert(address.clone());
        Ok(address)
    }

    async fn deallocate(&self, network: &str, address: &str) -> Result<()> {
        self.calls.push(format!("deallocate {} {}", network, address));
        if self.fail_deallocate {
            return Err(ExecutorError::AllocationService {
                network: network.to_string(),
                reason: "503 Service Unavailable".to_string(),
            });
        }
        // Releasing an unknown address is a no-op
        self.allocated.lock().unwrap().remove(address);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring

pub struct FakeWiring {
    pub calls: Calls,
    pub attached: Mutex<HashSet<String>>,
    pub fail_device: Option<String>,
}

impl FakeWiring {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            attached: Mutex::new(HashSet::new()),
            fail_device: None,
        }
    }

    pub fn attached(&self) -> usize {
        self.attached.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl InterfaceWiring for FakeWiring {
    async fn attach(&self, container: &str, iface: &WiredInterface) -> Result<()> {
        self.calls.push(format!("attach {}", iface.device));
        if self.fail_device.as_deref() == Some(iface.device.as_str()) {
            return Err(ExecutorError::Wiring {
                container: container.to_string(),
                device: iface.device.clone(),
                reason: "bridge not found".to_string(),
            });
        }
        self.attached.lock().unwrap().insert(iface.device.clone());
        Ok(())
    }

    async fn detach(&self, _namespace_pid: Option<u32>, iface: &WiredInterface) -> Result<()> {
        self.calls.push(format!("detach {}", iface.device));
        self.attached.lock().unwrap().remove(&iface.device);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registrar

pub struct FakeRegistrar {
    pub calls: Calls,
    pub registered: Mutex<HashMap<String, ServiceRegistration>>,
    pub fail_register: bool,
    pub fail_deregister: bool,
    pub multiple_checks: bool,
}

impl FakeRegistrar {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            registered: Mutex::new(HashMap::new()),
            fail_register: false,
            fail_deregister: false,
            multiple_checks: true,
        }
    }

    pub fn registration(&self, id: &str) -> Option<ServiceRegistration> {
        self.registered.lock().unwrap().get(id).cloned()
    }
}

#[async_trait::async_trait]
impl ServiceRegistrar for FakeRegistrar {
    fn supports_multiple_checks(&self) -> bool {
        self.multiple_checks
    }

    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        self.calls.push(format!("register {}", registration.id));
        if self.fail_register {
            return Err(ExecutorError::Registration {
                name: registration.id.clone(),
                reason: "500 Internal Server Error".to_string(),
            });
        }
        self.registered
            .lock()
            .unwrap()
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        self.calls.push(format!("deregister {}", id));
        if self.fail_deregister {
            return Err(ExecutorError::Deregistration {
                name: id.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.registered.lock().unwrap().remove(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assembly

/// Fakes kept alongside the orchestrator so tests can inspect and tweak them
pub struct Harness {
    pub calls: Calls,
    pub store: Arc<MemoryStore>,
    pub runtime: Arc<FakeRuntime>,
    pub allocator: Arc<FakeAllocator>,
    pub wiring: Arc<FakeWiring>,
    pub registrar: Arc<FakeRegistrar>,
}

impl Harness {
    pub fn new(descriptor_yaml: &str) -> Self {
        let calls = Calls::default();
        Self {
            store: Arc::new(MemoryStore::with_descriptor(NODE_ID, descriptor_yaml)),
            runtime: Arc::new(FakeRuntime::new(calls.clone())),
            allocator: Arc::new(FakeAllocator::new(calls.clone())),
            wiring: Arc::new(FakeWiring::new(calls.clone())),
            registrar: Arc::new(FakeRegistrar::new(calls.clone())),
            calls,
        }
    }

    /// Adjust a fake before building; only valid while no orchestrator holds it
    pub fn runtime_mut(&mut self) -> &mut FakeRuntime {
        Arc::get_mut(&mut self.runtime).unwrap()
    }

    pub fn allocator_mut(&mut self) -> &mut FakeAllocator {
        Arc::get_mut(&mut self.allocator).unwrap()
    }

    pub fn wiring_mut(&mut self) -> &mut FakeWiring {
        Arc::get_mut(&mut self.wiring).unwrap()
    }

    pub fn registrar_mut(&mut self) -> &mut FakeRegistrar {
        Arc::get_mut(&mut self.registrar).unwrap()
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.store.clone(),
            self.runtime.clone(),
            self.allocator.clone(),
            self.wiring.clone(),
            self.registrar.clone(),
            ReadinessConfig {
                poll_interval_ms: 10,
                timeout_secs: 2,
            },
        )
        .with_host("node-a")
    }
}
