//! Container lifecycle orchestration.
//!
//! Provisioning order: pull → start (async) → namespace readiness → per interface
//! resolve / allocate / wire → register → join start → persist. An attached start
//! lasts as long as the container, so a foreground run persists `running` before
//! joining and tears down once the container exits. Teardown runs the
//! reverse: deregister → detach / release → stop → persist.
//!
//! Any provisioning failure after the pull rolls back whatever succeeded so far
//! before the original error is returned. Teardown never stops at the first
//! failure; every step is attempted and failures are reported together.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::config::{ExecutorConfig, ReadinessConfig};
use crate::descriptor::{AddressMode, InterfaceSpec, NodeDescriptor};
use crate::discovery::{ConsulRegistrar, ServiceRegistrar, ServiceRegistration};
use crate::error::{ExecutorError, Result, TeardownFailure};
use crate::network::{AddressAllocator, HttpAllocator, InterfaceWiring, PipeworkWiring};
use crate::readiness::wait_for_namespace;
use crate::runtime::{ContainerRuntime, DockerRuntime, RunMode};
use crate::state::{
    ContainerRuntimeState, ContainerStatus, DescriptorStore, FileStore, WiredInterface,
};
use crate::utils::hostname;

type StartHandle = JoinHandle<Result<()>>;

/// What a provisioning attempt has done so far, for rollback
#[derive(Debug, Default)]
struct Progress {
    namespace_pid: Option<u32>,
    /// Interfaces with a resolved address, in wiring order (including one whose attach failed)
    interfaces: Vec<WiredInterface>,
    registration_attempted: bool,
    start_joined: bool,
}

/// A container recorded as running whose start task has not been joined yet
///
/// Returned by [`Orchestrator::launch`]; hand it back to [`Orchestrator::finish`].
pub struct Launched {
    node_id: String,
    descriptor: NodeDescriptor,
    mode: RunMode,
    start: StartHandle,
    progress: Progress,
    state: ContainerRuntimeState,
    exit: Option<Result<()>>,
}

impl Launched {
    /// Wait for the start task to end. Safe to cancel and call again.
    pub async fn wait(&mut self) {
        if self.exit.is_none() {
            let joined = (&mut self.start).await;
            self.exit = Some(join_result(&self.descriptor.container_name(), joined));
        }
    }
}

/// Summary returned by [`Orchestrator::show`]
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub name: String,
    pub host: Option<String>,
    pub status: ContainerStatus,
    pub interfaces: Vec<InterfaceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceSummary {
    pub device: String,
    pub network: String,
    pub address: Option<String>,
    pub dynamic: bool,
}

pub struct Orchestrator {
    store: Arc<dyn DescriptorStore>,
    runtime: Arc<dyn ContainerRuntime>,
    allocator: Arc<dyn AddressAllocator>,
    wiring: Arc<dyn InterfaceWiring>,
    registrar: Arc<dyn ServiceRegistrar>,
    readiness: ReadinessConfig,
    host: String,
    /// Set once the container was stopped on request
    interrupted: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        runtime: Arc<dyn ContainerRuntime>,
        allocator: Arc<dyn AddressAllocator>,
        wiring: Arc<dyn InterfaceWiring>,
        registrar: Arc<dyn ServiceRegistrar>,
        readiness: ReadinessConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            allocator,
            wiring,
            registrar,
            readiness,
            host: hostname(),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Wire the production clients from configuration
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(FileStore::new(config.store.root.clone())),
            Arc::new(DockerRuntime::new(config.runtime.clone())),
            Arc::new(HttpAllocator::new(&config.allocator)?),
            Arc::new(PipeworkWiring::new(config.runtime.clone())),
            Arc::new(ConsulRegistrar::new(&config.discovery)?),
            config.readiness.clone(),
        ))
    }

    /// Override the host name recorded in runtime state
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Turn a descriptor into a running, wired, registered container
    ///
    /// In [`RunMode::Foreground`] this returns once the container has exited and been
    /// torn down again. Equivalent to [`launch`](Self::launch), [`Launched::wait`] and
    /// [`finish`](Self::finish) in a row.
    pub async fn provision(&self, node_id: &str, mode: RunMode) -> Result<ContainerRuntimeState> {
        let mut launched = self.launch(node_id, mode).await?;
        launched.wait().await;
        self.finish(launched).await
    }

    /// Provision up to registration and record the container as running.
    ///
    /// The start task is left unjoined; the returned [`Launched`] must be passed to
    /// [`finish`](Self::finish). Once this returns, the store holds everything a
    /// later `stop` needs, even if this process never gets to finish.
    pub async fn launch(&self, node_id: &str, mode: RunMode) -> Result<Launched> {
        let descriptor = self.store.get(node_id).await?;
        let mut state = self.store.get_runtime_state(node_id).await?;
        let name = descriptor.container_name();

        if state.status == ContainerStatus::Running {
            return Err(ExecutorError::AlreadyRunning(name));
        }
        if !state.interfaces.is_empty() {
            self.release_leftovers(node_id, &name, &mut state).await?;
        }

        info!(target: "orchestrator", node = %node_id, container = %name, image = %descriptor.image, "provisioning container");

        // Nothing to undo if the pull fails
        self.runtime.pull(&descriptor.image).await?;

        let runtime = Arc::clone(&self.runtime);
        let start_descriptor = descriptor.clone();
        let mut start: StartHandle =
            tokio::spawn(async move { runtime.run(&start_descriptor, mode).await });

        let mut progress = Progress::default();
        if let Err(e) = self.bring_up(&descriptor, &mut start, &mut progress).await {
            self.rollback(node_id, &descriptor, start, &progress, state)
                .await;
            return Err(e);
        }

        // A detached start returns once the container is up. An attached one lasts
        // as long as the container, which is recorded as running meanwhile.
        if mode.is_daemon() && !progress.start_joined {
            let joined = (&mut start).await;
            progress.start_joined = true;
            if let Err(e) = join_result(&name, joined) {
                self.rollback(node_id, &descriptor, start, &progress, state)
                    .await;
                return Err(e);
            }
        }

        state.id = Some(name.clone());
        state.host = Some(self.host.clone());
        state.namespace_pid = progress.namespace_pid;
        state.interfaces = progress.interfaces.clone();
        state.mark(ContainerStatus::Running);

        if let Err(e) = self.store.set_runtime_state(node_id, &state).await {
            self.rollback(node_id, &descriptor, start, &progress, state)
                .await;
            return Err(e);
        }
        info!(target: "orchestrator", container = %name, host = %self.host, "container running");

        // Any start joined so far has succeeded
        let exit = progress.start_joined.then_some(Ok(()));
        Ok(Launched {
            node_id: node_id.to_string(),
            descriptor,
            mode,
            start,
            progress,
            state,
            exit,
        })
    }

    /// Settle a launched container once its start task has ended.
    ///
    /// A failed start is rolled back. An attached run is torn down, unless another
    /// operation already stopped or destroyed the container, in which case the state
    /// it recorded is returned untouched.
    pub async fn finish(&self, mut launched: Launched) -> Result<ContainerRuntimeState> {
        launched.wait().await;
        let Launched {
            node_id,
            descriptor,
            mode,
            start,
            progress,
            state,
            exit,
        } = launched;
        let name = descriptor.container_name();

        let stored = self.store.get_runtime_state(&node_id).await?;
        if stored.status != ContainerStatus::Running || stored.last_updated != state.last_updated {
            info!(target: "orchestrator", container = %name, status = %stored.status, "container was settled by another operation");
            return Ok(stored);
        }

        match exit {
            Some(Err(e)) if self.interrupted.load(Ordering::SeqCst) => {
                // An attached run ends with the stop signal's exit code
                info!(target: "orchestrator", container = %name, reason = %e, "container stopped on request");
            }
            Some(Err(e)) => {
                self.rollback(&node_id, &descriptor, start, &progress, state)
                    .await;
                return Err(e);
            }
            _ => {}
        }

        match mode {
            RunMode::Daemon => Ok(state),
            RunMode::Foreground => {
                info!(target: "orchestrator", container = %name, "container exited, tearing down");
                let (state, failures) = self.teardown(&node_id, &descriptor, state).await;
                into_teardown_result(&name, failures).map(|_| state)
            }
        }
    }

    /// Detach and release interfaces an earlier attempt could not clean up
    ///
    /// Whatever is still outstanding afterwards is persisted and provisioning is
    /// refused, so no address is ever dropped from the record while still held.
    async fn release_leftovers(
        &self,
        node_id: &str,
        name: &str,
        state: &mut ContainerRuntimeState,
    ) -> Result<()> {
        info!(
            target: "orchestrator",
            container = %name,
            leftover = state.interfaces.len(),
            "releasing interfaces left by an earlier attempt"
        );

        let mut failures = Vec::new();
        state.interfaces = self
            .unwire(state.namespace_pid, &state.interfaces, &mut failures)
            .await;
        self.store.set_runtime_state(node_id, state).await?;
        into_teardown_result(name, failures)
    }

    /// Steps after the pull, up to and including registration
    async fn bring_up(
        &self,
        descriptor: &NodeDescriptor,
        start: &mut StartHandle,
        progress: &mut Progress,
    ) -> Result<()> {
        let name = descriptor.container_name();

        // Readiness races the start task so an early start failure is not
        // mistaken for a slow container
        let pid = tokio::select! {
            joined = &mut *start => {
                progress.start_joined = true;
                join_result(&name, joined)?;
                wait_for_namespace(self.runtime.as_ref(), &name, &self.readiness).await?
            }
            ready = wait_for_namespace(self.runtime.as_ref(), &name, &self.readiness) => ready?,
        };
        progress.namespace_pid = Some(pid);

        for spec in &descriptor.interfaces {
            self.wire_interface(descriptor, spec, progress).await?;
        }

        let primary = progress
            .interfaces
            .first()
            .map(|iface| iface.address.clone())
            .ok_or_else(|| ExecutorError::InvalidDescriptor {
                node: name.clone(),
                reason: "no interface to register".to_string(),
            })?;
        let mut registration = ServiceRegistration::new(
            &name,
            &descriptor.service,
            &primary,
            &descriptor.tags,
            descriptor.port,
            &descriptor.check_ports,
        );
        if !self.registrar.supports_multiple_checks() && registration.checks.len() > 1 {
            let unmonitored: Vec<String> = registration
                .checks
                .drain(1..)
                .map(|check| check.tcp)
                .collect();
            warn!(
                target: "orchestrator",
                container = %name,
                unmonitored = ?unmonitored,
                "registrar takes a single check, remaining ports are not monitored"
            );
        }
        progress.registration_attempted = true;
        self.registrar.register(&registration).await
    }

    /// Resolve, allocate and attach one interface
    async fn wire_interface(
        &self,
        descriptor: &NodeDescriptor,
        spec: &InterfaceSpec,
        progress: &mut Progress,
    ) -> Result<()> {
        let name = descriptor.container_name();

        let (bridge, netmask, gateway) = match (&spec.bridge, &spec.netmask) {
            (Some(bridge), Some(netmask)) => (bridge.clone(), netmask.clone(), spec.gateway.clone()),
            _ => {
                let info = self.allocator.network_info(&spec.network).await?;
                (
                    spec.bridge.clone().unwrap_or(info.bridge),
                    spec.netmask.clone().unwrap_or(info.netmask),
                    spec.gateway.clone().or(info.gateway),
                )
            }
        };

        let (address, dynamic) = match &spec.mode {
            AddressMode::Static(address) => (address.clone(), false),
            AddressMode::Dynamic => {
                let address = self
                    .allocator
                    .allocate(&spec.network, &name, &descriptor.service)
                    .await?;
                (address, true)
            }
        };

        let iface = WiredInterface {
            device: spec.device.clone(),
            network: spec.network.clone(),
            address,
            netmask,
            bridge,
            gateway,
            dynamic,
        };

        // Recorded before attaching: a failed attach still owns its address and may
        // have left a half-created device behind
        progress.interfaces.push(iface.clone());
        self.wiring.attach(&name, &iface).await
    }

    /// Best-effort undo of a failed provisioning attempt
    async fn rollback(
        &self,
        node_id: &str,
        descriptor: &NodeDescriptor,
        start: StartHandle,
        progress: &Progress,
        mut state: ContainerRuntimeState,
    ) {
        let name = descriptor.container_name();
        warn!(target: "orchestrator", container = %name, "provisioning failed, rolling back");

        if progress.registration_attempted {
            if let Err(e) = self.registrar.deregister(&name).await {
                warn!(target: "orchestrator", container = %name, error = %e, "rollback: deregistration failed");
            }
        }

        let mut leaked = Vec::new();
        for iface in progress.interfaces.iter().rev() {
            if let Err(e) = self.wiring.detach(progress.namespace_pid, iface).await {
                warn!(target: "orchestrator", device = %iface.device, error = %e, "rollback: detach failed");
            }
            if iface.dynamic {
                if let Err(e) = self.allocator.deallocate(&iface.network, &iface.address).await {
                    warn!(target: "orchestrator", address = %iface.address, error = %e, "rollback: release failed");
                    leaked.push(iface.clone());
                }
            }
        }
        leaked.reverse();

        if !start.is_finished() {
            start.abort();
        }

        // A half-started container would make the retry collide on its name
        if let Err(e) = self.runtime.stop(&name).await {
            warn!(target: "orchestrator", container = %name, error = %e, "rollback: stop failed");
        }
        if let Err(e) = self.runtime.remove(&name).await {
            warn!(target: "orchestrator", container = %name, error = %e, "rollback: remove failed");
        }

        state.id = Some(name.clone());
        state.host = Some(self.host.clone());
        state.namespace_pid = progress.namespace_pid;
        state.interfaces = leaked;
        state.mark(ContainerStatus::Failed);
        if let Err(e) = self.store.set_runtime_state(node_id, &state).await {
            warn!(target: "orchestrator", container = %name, error = %e, "rollback: failed to persist failed state");
        }
    }

    /// Deregister, unwire, release and stop; persists `stopped` unless the node is
    /// still pending or already destroyed
    pub async fn stop(&self, node_id: &str) -> Result<()> {
        let descriptor = self.store.get(node_id).await?;
        let state = self.store.get_runtime_state(node_id).await?;
        let name = state.id.clone().unwrap_or_else(|| descriptor.container_name());

        info!(target: "orchestrator", node = %node_id, container = %name, "stopping container");
        let (_, failures) = self.teardown(node_id, &descriptor, state).await;
        into_teardown_result(&name, failures)
    }

    /// Stop, then remove the container and its storage; persists `destroyed`
    pub async fn destroy(&self, node_id: &str) -> Result<()> {
        let descriptor = self.store.get(node_id).await?;
        let state = self.store.get_runtime_state(node_id).await?;
        let name = state.id.clone().unwrap_or_else(|| descriptor.container_name());

        info!(target: "orchestrator", node = %node_id, container = %name, "destroying container");
        let (mut state, failures) = self.teardown(node_id, &descriptor, state).await;
        if !failures.is_empty() {
            warn!(target: "orchestrator", container = %name, failed_steps = failures.len(), "stop was incomplete, removing anyway");
        }

        // On failure the state written by teardown (stopped) stands
        self.runtime.remove(&name).await?;

        state.host = None;
        state.namespace_pid = None;
        state.mark(ContainerStatus::Destroyed);
        self.store.set_runtime_state(node_id, &state).await?;
        info!(target: "orchestrator", container = %name, "container destroyed");

        into_teardown_result(&name, failures)
    }

    /// Ask the runtime to stop the container without touching anything else.
    ///
    /// Used to end a foreground run: the attached start finishes and provisioning
    /// tears down by itself.
    pub async fn interrupt(&self, node_id: &str) -> Result<()> {
        let descriptor = self.store.get(node_id).await?;
        self.interrupted.store(true, Ordering::SeqCst);
        self.runtime.stop(&descriptor.container_name()).await
    }

    /// Name, host, status and interfaces of a node's container
    pub async fn show(&self, node_id: &str) -> Result<ContainerSummary> {
        let descriptor = self.store.get(node_id).await?;
        let state = self.store.get_runtime_state(node_id).await?;

        let interfaces = if state.interfaces.is_empty() {
            descriptor
                .interfaces
                .iter()
                .map(|spec| InterfaceSummary {
                    device: spec.device.clone(),
                    network: spec.network.clone(),
                    address: match &spec.mode {
                        AddressMode::Static(address) => Some(address.clone()),
                        AddressMode::Dynamic => None,
                    },
                    dynamic: spec.is_dynamic(),
                })
                .collect()
        } else {
            state
                .interfaces
                .iter()
                .map(|iface| InterfaceSummary {
                    device: iface.device.clone(),
                    network: iface.network.clone(),
                    address: Some(iface.address.clone()),
                    dynamic: iface.dynamic,
                })
                .collect()
        };

        Ok(ContainerSummary {
            name: state.id.clone().unwrap_or_else(|| descriptor.container_name()),
            host: state.host.clone(),
            status: state.status,
            interfaces,
        })
    }

    /// Every teardown step, attempted regardless of earlier failures
    async fn teardown(
        &self,
        node_id: &str,
        descriptor: &NodeDescriptor,
        mut state: ContainerRuntimeState,
    ) -> (ContainerRuntimeState, Vec<TeardownFailure>) {
        let name = state.id.clone().unwrap_or_else(|| descriptor.container_name());
        let mut failures = Vec::new();

        if let Err(e) = self.registrar.deregister(&name).await {
            warn!(target: "orchestrator", container = %name, error = %e, "deregistration failed, continuing");
            failures.push(failure("deregister", &e));
        }

        let remaining = self
            .unwire(state.namespace_pid, &state.interfaces, &mut failures)
            .await;

        if let Err(e) = self.runtime.stop(&name).await {
            warn!(target: "orchestrator", container = %name, error = %e, "runtime stop failed, continuing");
            failures.push(failure("stop container", &e));
        }

        state.id = Some(name.clone());
        state.interfaces = remaining;
        // Nothing ran for a pending node, and a removed container stays removed
        let status = match state.status {
            ContainerStatus::Pending | ContainerStatus::Destroyed => state.status,
            _ => ContainerStatus::Stopped,
        };
        state.mark(status);
        if let Err(e) = self.store.set_runtime_state(node_id, &state).await {
            failures.push(failure("persist state", &e));
        }

        if failures.is_empty() {
            info!(target: "orchestrator", container = %name, "container stopped");
        }
        (state, failures)
    }

    /// Detach and release interfaces in reverse wiring order
    ///
    /// Returns the interfaces with a step still outstanding. A released address is
    /// kept as static so a retry never releases it twice.
    async fn unwire(
        &self,
        namespace_pid: Option<u32>,
        interfaces: &[WiredInterface],
        failures: &mut Vec<TeardownFailure>,
    ) -> Vec<WiredInterface> {
        let mut remaining = Vec::new();
        for iface in interfaces.iter().rev() {
            let mut kept = iface.clone();
            let mut keep = false;

            if let Err(e) = self.wiring.detach(namespace_pid, iface).await {
                warn!(target: "orchestrator", device = %iface.device, error = %e, "detach failed, continuing");
                failures.push(failure(format!("detach {}", iface.device), &e));
                keep = true;
            }

            if iface.dynamic {
                match self.allocator.deallocate(&iface.network, &iface.address).await {
                    Ok(()) => kept.dynamic = false,
                    Err(e) => {
                        warn!(target: "orchestrator", address = %iface.address, error = %e, "release failed, continuing");
                        failures.push(failure(format!("release {}", iface.device), &e));
                        keep = true;
                    }
                }
            }

            if keep {
                remaining.push(kept);
            }
        }
        remaining.reverse();
        remaining
    }
}

fn failure(step: impl Into<String>, e: &ExecutorError) -> TeardownFailure {
    TeardownFailure {
        step: step.into(),
        stage: e.stage(),
        message: e.to_string(),
    }
}

fn into_teardown_result(container: &str, failures: Vec<TeardownFailure>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ExecutorError::PartialTeardown {
            container: container.to_string(),
            failures,
        })
    }
}

fn join_result(container: &str, joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(ExecutorError::RuntimeStart {
            container: container.to_string(),
            reason: format!("start task failed: {}", e),
        }),
    }
}
