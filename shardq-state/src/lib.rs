//! Partitioned quantum state storage
//!
//! This crate holds the data side of distributed simulation:
//!
//! - [`Layout`]: which qubits are global (select a piece) and which are local,
//!   with the transpose order relating the two views
//! - [`transpose`]: bit-axis permutation of dense buffers
//! - [`StateArena`]: the `D` pieces of a state with split, merge and swap
//! - [`kernel`]: dense gate application on one buffer
//!
//! # Example
//!
//! ```
//! use shardq_state::{Layout, StateArena};
//! use num_complex::Complex64;
//!
//! let state: Vec<Complex64> = (0..8).map(|i| Complex64::new(i as f64, 0.0)).collect();
//! let mut arena = StateArena::split(&state, Layout::new(3, &[2]).unwrap()).unwrap();
//! arena.swap(&[0]).unwrap();
//! assert_eq!(arena.merge().unwrap(), state);
//! ```

pub mod arena;
pub mod error;
pub mod kernel;
pub mod permutation;
pub mod transpose;

pub use arena::{global_qubit_count, Piece, StateArena};
pub use error::{Result, StateError};
pub use permutation::Layout;
pub use transpose::transpose_state;
