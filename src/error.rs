//! Error kinds surfaced by the lifecycle operations.
//!
//! Every error knows which [`Stage`] produced it so callers (and logs) can tell
//! an image pull failure from a wiring failure without parsing messages.

use std::fmt;

/// Provisioning / teardown stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Descriptor,
    ImagePull,
    RuntimeStart,
    Allocation,
    Wiring,
    Registration,
    Deregistration,
    Detach,
    RuntimeStop,
    RuntimeRemove,
    Store,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Descriptor => "descriptor",
            Stage::ImagePull => "image-pull",
            Stage::RuntimeStart => "runtime-start",
            Stage::Allocation => "allocation",
            Stage::Wiring => "wiring",
            Stage::Registration => "registration",
            Stage::Deregistration => "deregistration",
            Stage::Detach => "detach",
            Stage::RuntimeStop => "runtime-stop",
            Stage::RuntimeRemove => "runtime-remove",
            Stage::Store => "store",
            Stage::Teardown => "teardown",
        };
        f.write_str(s)
    }
}

/// One failed step of a stop/destroy sequence.
#[derive(Debug, Clone)]
pub struct TeardownFailure {
    /// Human readable step name, e.g. `release eth0`
    pub step: String,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.step, self.stage, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("invalid descriptor {node}: {reason}")]
    InvalidDescriptor { node: String, reason: String },

    #[error("container {0} is already running")]
    AlreadyRunning(String),

    #[error("failed to pull image {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("failed to start container {container}: {reason}")]
    RuntimeStart { container: String, reason: String },

    #[error("failed to stop container {container}: {reason}")]
    RuntimeStop { container: String, reason: String },

    #[error("failed to remove container {container}: {reason}")]
    RuntimeRemove { container: String, reason: String },

    #[error("no free addresses left in network {network}")]
    AllocationExhausted { network: String },

    #[error("network service error for {network}: {reason}")]
    AllocationService { network: String, reason: String },

    #[error("failed to wire {device} into {container}: {reason}")]
    Wiring {
        container: String,
        device: String,
        reason: String,
    },

    #[error("failed to detach {device}: {reason}")]
    Detach { device: String, reason: String },

    #[error("failed to register {name} in service discovery: {reason}")]
    Registration { name: String, reason: String },

    #[error("failed to deregister {name} from service discovery: {reason}")]
    Deregistration { name: String, reason: String },

    #[error("descriptor store error: {0}")]
    Store(String),

    #[error("teardown of {container} incomplete: {}", join_failures(.failures))]
    PartialTeardown {
        container: String,
        failures: Vec<TeardownFailure>,
    },
}

fn join_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ExecutorError {
    pub fn stage(&self) -> Stage {
        match self {
            ExecutorError::DescriptorNotFound(_)
            | ExecutorError::InvalidDescriptor { .. }
            | ExecutorError::AlreadyRunning(_) => Stage::Descriptor,
            ExecutorError::ImagePull { .. } => Stage::ImagePull,
            ExecutorError::RuntimeStart { .. } => Stage::RuntimeStart,
            ExecutorError::RuntimeStop { .. } => Stage::RuntimeStop,
            ExecutorError::RuntimeRemove { .. } => Stage::RuntimeRemove,
            ExecutorError::AllocationExhausted { .. } | ExecutorError::AllocationService { .. } => {
                Stage::Allocation
            }
            ExecutorError::Wiring { .. } => Stage::Wiring,
            ExecutorError::Detach { .. } => Stage::Detach,
            ExecutorError::Registration { .. } => Stage::Registration,
            ExecutorError::Deregistration { .. } => Stage::Deregistration,
            ExecutorError::Store(_) => Stage::Store,
            ExecutorError::PartialTeardown { .. } => Stage::Teardown,
        }
    }

    /// Failed steps of a partial teardown, empty for every other kind.
    pub fn teardown_failures(&self) -> &[TeardownFailure] {
        match self {
            ExecutorError::PartialTeardown { failures, .. } => failures,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
