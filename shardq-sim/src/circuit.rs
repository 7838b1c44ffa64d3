//! Distributed circuit driver
//!
//! A [`DistributedCircuit`] owns the gate list, the schedule built from it,
//! the per-device queues and the pieces of the state. `execute` walks the
//! schedule: split the initial state, run group 0, swap, run group 1, and so
//! on, then merges the pieces into the final state vector.

use crate::config::DistributedConfig;
use crate::device::{DeviceBackend, ThreadPoolBackend};
use crate::error::{DistributedError, Result};
use crate::round::ExecutionRound;
use crate::schedule::{DeviceQueues, Schedule, Scheduler};
use crate::telemetry::{ExecutionMetrics, ExecutionTelemetry, RoundTelemetry};
use num_complex::Complex64;
use shardq_core::{Gate, QuantumError, QubitId};
use shardq_state::{global_qubit_count, Layout, StateArena, StateError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Starting state of an execution
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InitialState {
    /// |0...0⟩, written directly into piece 0
    #[default]
    Zero,
    /// Full `2^N` amplitude vector
    Vector(Vec<Complex64>),
    /// Row-major `2^N x 2^N` density matrix
    DensityMatrix(Vec<Complex64>),
}

impl From<Vec<Complex64>> for InitialState {
    fn from(amplitudes: Vec<Complex64>) -> Self {
        InitialState::Vector(amplitudes)
    }
}

/// Observer of intermediate states
pub trait Callback: Send {
    fn on_state(&mut self, state: &[Complex64]);
}

/// Circuit executed by splitting its state across several devices
///
/// # Example
/// ```
/// use shardq_core::Gate;
/// use shardq_sim::{DeviceMap, DistributedCircuit, DistributedConfig, InitialState};
///
/// let config = DistributedConfig::with_devices(DeviceMap::uniform("cpu", 2));
/// let mut circuit = DistributedCircuit::new(2, config).unwrap();
/// circuit.add(Gate::x(0)).unwrap();
///
/// let state = circuit.execute(InitialState::Zero).unwrap();
/// assert_eq!(state[0b10].re, 1.0);
/// ```
pub struct DistributedCircuit<B: DeviceBackend = ThreadPoolBackend> {
    num_qubits: usize,
    num_global: usize,
    config: DistributedConfig,
    backend: B,
    gates: Vec<Arc<Gate>>,
    measured: Vec<QubitId>,
    schedule: Option<Schedule>,
    queues: Option<DeviceQueues>,
    layout: Option<Layout>,
    arena: Option<StateArena>,
    telemetry: Option<ExecutionTelemetry>,
}

impl DistributedCircuit<ThreadPoolBackend> {
    /// Create a circuit of `num_qubits` qubits on a thread-pool backend
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the devices hold more
    /// pieces than the state has amplitudes.
    pub fn new(num_qubits: usize, config: DistributedConfig) -> Result<Self> {
        config.validate()?;
        let backend = ThreadPoolBackend::new(config.devices.clone());
        Self::with_backend(num_qubits, config, backend)
    }
}

impl<B: DeviceBackend> DistributedCircuit<B> {
    /// Create a circuit driven by a custom backend
    ///
    /// The backend must serve exactly the devices named in `config`.
    pub fn with_backend(num_qubits: usize, config: DistributedConfig, backend: B) -> Result<Self> {
        config.validate()?;
        if backend.devices() != &config.devices {
            return Err(DistributedError::InvalidConfig(format!(
                "backend {} serves different devices than configured",
                backend.name()
            )));
        }
        let num_global = global_qubit_count(num_qubits, config.num_pieces())?;

        debug!(
            num_qubits,
            num_global,
            devices = config.devices.len(),
            "distributed circuit created"
        );

        Ok(Self {
            num_qubits,
            num_global,
            config,
            backend,
            gates: Vec::new(),
            measured: Vec::new(),
            schedule: None,
            queues: None,
            layout: None,
            arena: None,
            telemetry: None,
        })
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of global qubits, `log2` of the piece count
    #[inline]
    pub fn num_global(&self) -> usize {
        self.num_global
    }

    #[inline]
    pub fn config(&self) -> &DistributedConfig {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Append a gate
    ///
    /// Invalidates any schedule built so far.
    pub fn add(&mut self, gate: Gate) -> Result<()> {
        if gate.max_qubit() >= self.num_qubits {
            return Err(QuantumError::invalid_qubit(gate.max_qubit(), self.num_qubits).into());
        }
        self.gates.push(Arc::new(gate));
        self.schedule = None;
        self.queues = None;
        Ok(())
    }

    /// Append several gates
    pub fn add_all(&mut self, gates: impl IntoIterator<Item = Gate>) -> Result<()> {
        for gate in gates {
            self.add(gate)?;
        }
        Ok(())
    }

    #[inline]
    pub fn gates(&self) -> &[Arc<Gate>] {
        &self.gates
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Record a measurement of `qubits` at the end of the circuit
    ///
    /// Sampling is not available; see [`DistributedCircuit::execute_with_shots`].
    pub fn add_measurement(&mut self, qubits: &[usize]) -> Result<()> {
        for &q in qubits {
            if q >= self.num_qubits {
                return Err(QuantumError::invalid_qubit(q, self.num_qubits).into());
            }
            self.measured.push(QubitId::new(q));
        }
        Ok(())
    }

    /// Measured qubits
    #[inline]
    pub fn measured_qubits(&self) -> &[QubitId] {
        &self.measured
    }

    fn current_layout(&self) -> Result<&Layout> {
        match &self.arena {
            Some(arena) => Ok(arena.layout()),
            None => self.layout.as_ref().ok_or(DistributedError::NotSet("global qubits")),
        }
    }

    /// Current global qubits, sorted
    ///
    /// # Errors
    /// Returns error before a schedule, a state or an explicit set exists.
    pub fn global_qubits(&self) -> Result<&[usize]> {
        Ok(self.current_layout()?.global_qubits())
    }

    /// Current local qubits, ascending
    pub fn local_qubits(&self) -> Result<&[usize]> {
        Ok(self.current_layout()?.local_qubits())
    }

    /// Globals followed by locals
    pub fn transpose_order(&self) -> Result<&[usize]> {
        Ok(self.current_layout()?.transpose_order())
    }

    /// Set the global qubits
    ///
    /// If pieces exist they are swapped to the new layout, so the represented
    /// state does not change.
    ///
    /// # Errors
    /// Returns error unless exactly `num_global` distinct in-range qubits are given.
    pub fn set_global_qubits(&mut self, qubits: &[usize]) -> Result<()> {
        if qubits.len() != self.num_global {
            return Err(DistributedError::GlobalQubitCount {
                expected: self.num_global,
                actual: qubits.len(),
                devices: self.config.num_pieces(),
            });
        }
        let layout = Layout::new(self.num_qubits, qubits)?;
        if let Some(arena) = &mut self.arena {
            arena.swap(layout.global_qubits())?;
        }
        self.layout = Some(layout);
        Ok(())
    }

    /// Schedule of the current gate list, built on first use
    ///
    /// Also sets the global qubits to the first group's set when none are set.
    ///
    /// # Errors
    /// Returns error if the circuit has no gates or a gate is too wide.
    pub fn schedule(&mut self) -> Result<&Schedule> {
        if self.schedule.is_none() {
            let schedule = Scheduler::new(self.num_qubits, self.num_global).build(&self.gates)?;
            let queues = schedule.device_queues(self.backend.devices())?;
            if self.layout.is_none() {
                self.layout = Some(Layout::new(
                    self.num_qubits,
                    schedule.initial_global_qubits(),
                )?);
            }
            self.queues = Some(queues);
            self.schedule = Some(schedule);
        }
        self.schedule.as_ref().ok_or(DistributedError::EmptyCircuit)
    }

    /// Per-device reduced gate queues, built with the schedule
    pub fn device_queues(&mut self) -> Result<&DeviceQueues> {
        self.schedule()?;
        self.queues.as_ref().ok_or(DistributedError::EmptyCircuit)
    }

    /// Split `initial` into pieces under the current layout
    ///
    /// Without a layout the last `num_global` qubits are global.
    ///
    /// # Errors
    /// Returns error if pieces already exist, the vector has the wrong length
    /// or a density matrix is given.
    pub fn initialize(&mut self, initial: InitialState) -> Result<()> {
        if self.arena.is_some() {
            return Err(DistributedError::AlreadyInitialized);
        }
        let layout = match &self.layout {
            Some(layout) => layout.clone(),
            None => Layout::trailing(self.num_qubits, self.num_global)?,
        };

        let arena = match initial {
            InitialState::Zero => StateArena::basis_zero(layout),
            InitialState::Vector(amplitudes) => StateArena::split(&amplitudes, layout)?,
            InitialState::DensityMatrix(_) => {
                return Err(DistributedError::unsupported("Density matrices"))
            }
        };
        self.layout = Some(arena.layout().clone());
        self.arena = Some(arena);
        Ok(())
    }

    /// Whether pieces exist
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.arena.is_some()
    }

    /// Run the circuit and return the final state vector
    ///
    /// # Errors
    /// Returns error if pieces already exist (call [`reset`](Self::reset)
    /// first), the circuit cannot be scheduled, the initial state is invalid
    /// or a device task fails. After a device failure the pieces are dropped.
    #[instrument(
        skip_all,
        fields(
            num_qubits = self.num_qubits,
            gates = self.gates.len(),
            memory_device = %self.config.memory_device
        )
    )]
    pub fn execute(&mut self, initial: InitialState) -> Result<Vec<Complex64>> {
        if self.arena.is_some() {
            return Err(DistributedError::AlreadyInitialized);
        }
        let start = Instant::now();
        let initial_globals = self.schedule()?.initial_global_qubits().to_vec();
        self.layout = Some(Layout::new(self.num_qubits, &initial_globals)?);

        info!(
            groups = self.schedule.as_ref().map_or(0, Schedule::len),
            pieces = self.config.num_pieces(),
            memory_device = %self.config.memory_device,
            "distributed execution started"
        );

        let mut telemetry = ExecutionTelemetry::new();
        telemetry.memory_device = self.config.memory_device.clone();
        let split_start = Instant::now();
        self.initialize(initial)?;
        telemetry.split_time = split_start.elapsed();
        telemetry.log_event("split");

        let result = self.run_groups(&mut telemetry);
        if let Err(err) = result {
            warn!(error = %err, "distributed execution aborted, pieces dropped");
            telemetry.log_error(err.to_string());
            self.arena = None;
            self.store_telemetry(telemetry);
            return Err(err);
        }

        let merge_start = Instant::now();
        let state = self.final_state()?;
        telemetry.merge_time = merge_start.elapsed();
        telemetry.total_time = start.elapsed();
        telemetry.log_event("merge");

        info!(
            elapsed_ms = telemetry.total_time.as_secs_f64() * 1000.0,
            "distributed execution finished"
        );
        self.store_telemetry(telemetry);
        Ok(state)
    }

    fn run_groups(&mut self, telemetry: &mut ExecutionTelemetry) -> Result<()> {
        let (schedule, queues, arena) = match (&self.schedule, &self.queues, &mut self.arena) {
            (Some(schedule), Some(queues), Some(arena)) => (schedule, queues, arena),
            _ => return Err(DistributedError::NotSet("schedule")),
        };

        let initial_norm = arena.norm_sqr();
        for (index, group) in schedule.groups().iter().enumerate() {
            let swap_start = Instant::now();
            let swapped = arena.global_qubits() != group.global_qubits();
            if swapped {
                arena.swap(group.global_qubits())?;
                debug!(group = index, global = ?group.global_qubits(), "pieces swapped");
            }
            let swap_time = if swapped {
                swap_start.elapsed()
            } else {
                std::time::Duration::ZERO
            };

            let round_start = Instant::now();
            let mut round = ExecutionRound::new(&self.backend, queues);
            if !self.config.parallel {
                round = round.sequential();
            }
            let applied = round.run(arena, index)?;
            debug!(group = index, gates = group.len(), applied, "group executed");

            if self.config.collect_telemetry {
                for gate in group.gates() {
                    telemetry.inc_gate_type(&gate.name());
                }
                telemetry.record_memory(arena.memory_bytes());
                telemetry.record_round(RoundTelemetry {
                    group: index,
                    global_qubits: group.global_qubits().to_vec(),
                    gates_applied: applied,
                    swapped,
                    swap_time,
                    round_time: round_start.elapsed(),
                });
            }
        }

        if self.config.validate_norm {
            let drift = (arena.norm_sqr().sqrt() - initial_norm.sqrt()).abs();
            if drift > self.config.norm_tolerance {
                return Err(StateError::NotNormalized {
                    norm: arena.norm_sqr().sqrt(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn store_telemetry(&mut self, telemetry: ExecutionTelemetry) {
        if self.config.collect_telemetry {
            self.telemetry = Some(telemetry);
        }
    }

    /// Run the circuit, sampling `nshots` measurements if any were added
    ///
    /// # Errors
    /// Sampling is not available for distributed circuits: with a recorded
    /// measurement and `Some(nshots)` the circuit is executed and an
    /// unsupported-operation error returned. The final state stays readable.
    pub fn execute_with_shots(
        &mut self,
        initial: InitialState,
        nshots: Option<usize>,
    ) -> Result<Vec<Complex64>> {
        let state = self.execute(initial)?;
        if nshots.is_some() && !self.measured.is_empty() {
            return Err(DistributedError::unsupported("Measurements"));
        }
        Ok(state)
    }

    /// Merge the current pieces into a full state vector
    ///
    /// # Errors
    /// Returns error if no pieces exist.
    pub fn final_state(&self) -> Result<Vec<Complex64>> {
        let arena = self
            .arena
            .as_ref()
            .ok_or(DistributedError::NotSet("final state"))?;
        Ok(arena.merge()?)
    }

    /// Drop the pieces so the circuit can be executed again
    pub fn reset(&mut self) {
        if self.arena.take().is_some() {
            debug!("pieces dropped");
        }
    }

    /// Telemetry of the last execution, if collected
    pub fn telemetry(&self) -> Option<&ExecutionTelemetry> {
        self.telemetry.as_ref()
    }

    /// Metrics of the last execution, if telemetry was collected
    pub fn metrics(&self) -> Option<ExecutionMetrics> {
        self.telemetry.as_ref().map(ExecutionMetrics::from_telemetry)
    }

    pub fn compile(&mut self) -> Result<()> {
        Err(DistributedError::unsupported("Compiling"))
    }

    /// Noisy simulation with per-qubit `(px, py, pz)` Pauli probabilities
    pub fn with_noise(&self, _noise_map: &[(f64, f64, f64)]) -> Result<Self> {
        Err(DistributedError::unsupported("Noise"))
    }

    pub fn add_callback(&mut self, _callback: Box<dyn Callback>) -> Result<()> {
        Err(DistributedError::unsupported("Callbacks"))
    }
}

impl<B: DeviceBackend> std::fmt::Debug for DistributedCircuit<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedCircuit")
            .field("num_qubits", &self.num_qubits)
            .field("num_global", &self.num_global)
            .field("backend", &self.backend.name())
            .field("gates", &self.gates.len())
            .field("scheduled", &self.schedule.is_some())
            .field("initialized", &self.arena.is_some())
            .finish()
    }
}
