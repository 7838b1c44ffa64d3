//! Core types for ShardQ distributed state-vector simulation
//!
//! This crate provides the vocabulary shared by the partitioning engine:
//! - [`QubitId`]: Type-safe qubit addressing
//! - [`Gate`] / [`GateKind`]: Tagged gate representation with target and control qubits
//! - [`matrices`]: Standard gate matrices
//!
//! Qubit `0` is the most significant bit of a basis-state index, so a state of
//! `n` qubits is viewed as an `n`-axis tensor of shape `(2, 2, ..., 2)` whose
//! axis `q` belongs to qubit `q`.
//!
//! # Example
//! ```
//! use shardq_core::{Gate, QubitId};
//!
//! let h = Gate::h(0);
//! let cnot = Gate::cnot(0, 1).unwrap();
//! assert_eq!(cnot.targets(), &[QubitId::new(1)]);
//! assert_eq!(cnot.controls(), &[QubitId::new(0)]);
//! assert_eq!(h.name(), "H");
//! ```

pub mod error;
pub mod gate;
pub mod matrices;
pub mod qubit;

pub use error::QuantumError;
pub use gate::{Gate, GateKind};
pub use num_complex::Complex64;
pub use qubit::QubitId;

/// Type alias for results in ShardQ core
pub type Result<T> = std::result::Result<T, QuantumError>;
