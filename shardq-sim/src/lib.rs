//! Multi-device state-vector simulation
//!
//! The state of an `N`-qubit circuit is split into `D = 2^G` pieces, one or
//! more per calculation device. `G` qubits are global: their values select a
//! piece. Gates only act on local qubits, so the circuit is cut into groups
//! that each run under a fixed global set, with a swap of the pieces between
//! groups.
//!
//! # Features
//!
//! - **Scheduling**: single-pass grouping of the gate list ([`Scheduler`])
//! - **Gate reduction**: gates rewritten into the local index space of a piece,
//!   global controls turned into piece conditions ([`ReducedGate`])
//! - **Device pool**: one worker per device with a join barrier per round
//!   ([`ThreadPoolBackend`])
//! - **Telemetry**: per-round timings and gate counts
//!
//! # Example
//!
//! ```
//! use shardq_core::Gate;
//! use shardq_sim::{DeviceMap, DistributedCircuit, DistributedConfig, InitialState};
//!
//! let devices = DeviceMap::new().with_device("cpu:0", 2).with_device("cpu:1", 2);
//! let mut circuit = DistributedCircuit::new(4, DistributedConfig::with_devices(devices)).unwrap();
//! circuit.add(Gate::h(0)).unwrap();
//! circuit.add(Gate::cnot(0, 3).unwrap()).unwrap();
//!
//! let state = circuit.execute(InitialState::Zero).unwrap();
//! assert!((state[0b0000].norm_sqr() - 0.5).abs() < 1e-12);
//! assert!((state[0b1001].norm_sqr() - 0.5).abs() < 1e-12);
//! ```

pub mod circuit;
pub mod config;
pub mod device;
pub mod error;
pub mod reduce;
pub mod round;
pub mod schedule;
pub mod telemetry;

pub use circuit::{Callback, DistributedCircuit, InitialState};
pub use config::{DeviceMap, DistributedConfig};
pub use device::{DeviceBackend, DeviceJob, ThreadPoolBackend};
pub use error::{DistributedError, ErrorKind, Result};
pub use reduce::{reduce, ReducedGate};
pub use round::ExecutionRound;
pub use schedule::{DeviceQueue, DeviceQueues, Schedule, ScheduleGroup, Scheduler};
pub use telemetry::{ExecutionMetrics, ExecutionTelemetry, RoundTelemetry};
