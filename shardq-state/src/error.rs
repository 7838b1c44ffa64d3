//! Error types for partitioned state operations

use shardq_core::QuantumError;
use thiserror::Error;

/// Errors that can occur during state layout and kernel operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Invalid qubit index
    #[error("Invalid qubit index {index} for {num_qubits}-qubit state")]
    InvalidQubitIndex { index: usize, num_qubits: usize },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Piece count is not a power of two or exceeds the state dimension
    #[error("Invalid piece count {pieces} for {num_qubits}-qubit state")]
    InvalidPieceCount { pieces: usize, num_qubits: usize },

    /// Wrong number of global qubits for the piece count
    #[error("Invalid number of global qubits {actual} for {pieces} pieces (expected {expected})")]
    GlobalQubitCount {
        expected: usize,
        actual: usize,
        pieces: usize,
    },

    /// Qubit listed twice in a layout or gate
    #[error("Duplicate qubit {index} in {context}")]
    DuplicateQubit { index: usize, context: &'static str },

    /// Permutation is not a bijection on the axes
    #[error("Invalid axis permutation {order:?} for {num_qubits} qubits")]
    InvalidPermutation { order: Vec<usize>, num_qubits: usize },

    /// State not normalized
    #[error("State vector not normalized, norm = {norm}")]
    NotNormalized { norm: f64 },

    /// Gate construction error
    #[error("Gate error: {0}")]
    Gate(#[from] QuantumError),
}

/// Result type for state operations
pub type Result<T> = std::result::Result<T, StateError>;
