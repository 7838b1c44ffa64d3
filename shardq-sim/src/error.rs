//! Error types for distributed execution

use shardq_core::QuantumError;
use shardq_state::StateError;
use thiserror::Error;

/// Result type for distributed circuit operations
pub type Result<T> = std::result::Result<T, DistributedError>;

/// Errors that can occur while scheduling or executing a distributed circuit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributedError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Total piece count is not a power of two
    #[error("Number of calculation devices should be a power of 2 but is {devices}")]
    InvalidDeviceCount { devices: usize },

    /// Wrong number of global qubits for the piece count
    #[error("Invalid number of global qubits {actual} for using {devices} calculation devices (expected {expected})")]
    GlobalQubitCount {
        expected: usize,
        actual: usize,
        devices: usize,
    },

    /// Gate has more targets than a piece has local qubits
    #[error("Gate {gate} targets {targets} qubits but only {local} are local to a device")]
    GateTooWide {
        gate: String,
        targets: usize,
        local: usize,
    },

    /// A gate target was found among the global qubits during reduction
    #[error("Target qubit {qubit} of {gate} is global under {global:?}")]
    GlobalTarget {
        gate: String,
        qubit: usize,
        global: Vec<usize>,
    },

    /// Gate construction or qubit range error
    #[error("Invalid gate: {0}")]
    Gate(#[from] QuantumError),

    /// Value read before it was set
    #[error("Cannot access {0} before being set")]
    NotSet(&'static str),

    /// Pieces already exist
    #[error("Attempting to initialize distributed circuit state that is already initialized")]
    AlreadyInitialized,

    /// Nothing to distribute
    #[error("No gates available to set for distributed run")]
    EmptyCircuit,

    /// State layout or kernel failure outside a device task
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Operation not available for distributed circuits
    #[error("{0} not implemented for distributed circuits")]
    Unsupported(String),

    /// A device task failed while applying its gate queue
    #[error("Device task on {device} failed at piece {piece} applying {gate}: {reason}")]
    DeviceTask {
        device: String,
        piece: usize,
        gate: String,
        reason: String,
    },
}

/// Category of a [`DistributedError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device count, global-qubit count or gate shape does not fit the partition
    Configuration,
    /// Operation issued in the wrong lifecycle state
    State,
    /// Requested feature is not available in distributed mode
    Unsupported,
    /// Gate application failed inside a device task
    DeviceTask,
}

impl DistributedError {
    /// Create an unsupported operation error
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DistributedError::InvalidConfig(_)
            | DistributedError::InvalidDeviceCount { .. }
            | DistributedError::GlobalQubitCount { .. }
            | DistributedError::GateTooWide { .. }
            | DistributedError::GlobalTarget { .. }
            | DistributedError::Gate(_) => ErrorKind::Configuration,
            DistributedError::State(err) => match err {
                StateError::InvalidPieceCount { .. }
                | StateError::GlobalQubitCount { .. }
                | StateError::InvalidQubitIndex { .. }
                | StateError::DuplicateQubit { .. }
                | StateError::InvalidPermutation { .. }
                | StateError::Gate(_) => ErrorKind::Configuration,
                _ => ErrorKind::State,
            },
            DistributedError::NotSet(_)
            | DistributedError::AlreadyInitialized
            | DistributedError::EmptyCircuit => ErrorKind::State,
            DistributedError::Unsupported(_) => ErrorKind::Unsupported,
            DistributedError::DeviceTask { .. } => ErrorKind::DeviceTask,
        }
    }
}
