//! Error types for gate construction

use crate::QubitId;
use thiserror::Error;

/// Errors that can occur while building gates
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuantumError {
    /// Invalid qubit index used
    #[error("Invalid qubit index {0}: circuit has only {1} qubits")]
    InvalidQubit(usize, usize),

    /// Gate applied to wrong number of target qubits
    #[error("Gate '{gate}' requires {expected} target qubits, but {actual} were provided")]
    InvalidQubitCount {
        gate: String,
        expected: usize,
        actual: usize,
    },

    /// Duplicate qubit in gate operation
    #[error("Duplicate qubit {0} in gate operation")]
    DuplicateQubit(QubitId),

    /// Matrix does not describe a square operator on the given targets
    #[error("Matrix for gate '{gate}' has {actual} elements, expected {expected}")]
    InvalidMatrix {
        gate: String,
        expected: usize,
        actual: usize,
    },
}

impl QuantumError {
    /// Create an invalid qubit error
    pub fn invalid_qubit(qubit: usize, num_qubits: usize) -> Self {
        Self::InvalidQubit(qubit, num_qubits)
    }

    /// Create an invalid qubit count error
    pub fn invalid_qubit_count(gate: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InvalidQubitCount {
            gate: gate.into(),
            expected,
            actual,
        }
    }
}
