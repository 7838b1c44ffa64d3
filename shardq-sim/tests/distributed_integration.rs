//! End-to-end checks of distributed execution against a single dense buffer

use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardq_core::Gate;
use shardq_sim::{
    DeviceBackend, DeviceJob, DeviceMap, DistributedCircuit, DistributedConfig, DistributedError,
    ErrorKind, InitialState, ThreadPoolBackend,
};
use shardq_state::kernel;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn reference(num_qubits: usize, gates: &[Gate], initial: Vec<Complex64>) -> Vec<Complex64> {
    let mut state = initial;
    for gate in gates {
        kernel::apply_gate(&mut state, num_qubits, gate).unwrap();
    }
    state
}

fn basis_zero(num_qubits: usize) -> Vec<Complex64> {
    let mut state = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
    state[0] = Complex64::new(1.0, 0.0);
    state
}

fn random_state(rng: &mut StdRng, num_qubits: usize) -> Vec<Complex64> {
    let raw: Vec<Complex64> = (0..1usize << num_qubits)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    let norm = raw.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    raw.into_iter().map(|a| a / norm).collect()
}

fn distinct(rng: &mut StdRng, num_qubits: usize, count: usize) -> Vec<usize> {
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count {
        let q = rng.gen_range(0..num_qubits);
        if !picked.contains(&q) {
            picked.push(q);
        }
    }
    picked
}

fn random_circuit(rng: &mut StdRng, num_qubits: usize, len: usize) -> Vec<Gate> {
    (0..len)
        .map(|_| {
            let theta = rng.gen_range(0.0..std::f64::consts::TAU);
            match rng.gen_range(0..9) {
                0 => Gate::h(rng.gen_range(0..num_qubits)),
                1 => Gate::x(rng.gen_range(0..num_qubits)),
                2 => Gate::ry(rng.gen_range(0..num_qubits), theta),
                3 => Gate::rz(rng.gen_range(0..num_qubits), theta),
                4 => {
                    let q = distinct(rng, num_qubits, 2);
                    Gate::cnot(q[0], q[1]).unwrap()
                }
                5 => {
                    let q = distinct(rng, num_qubits, 2);
                    Gate::cz(q[0], q[1]).unwrap()
                }
                6 => {
                    let q = distinct(rng, num_qubits, 2);
                    Gate::crz(q[0], q[1], theta).unwrap()
                }
                7 => {
                    let q = distinct(rng, num_qubits, 2);
                    Gate::swap(q[0], q[1]).unwrap()
                }
                _ => {
                    let q = distinct(rng, num_qubits, 3);
                    Gate::toffoli(q[0], q[1], q[2]).unwrap()
                }
            }
        })
        .collect()
}

fn distributed(num_qubits: usize, pieces: usize) -> DistributedCircuit {
    let config = DistributedConfig::with_devices(DeviceMap::uniform("cpu", pieces))
        .with_norm_validation(true, 1e-9);
    DistributedCircuit::new(num_qubits, config).unwrap()
}

fn assert_states_eq(actual: &[Complex64], expected: &[Complex64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_abs_diff_eq!(a.re, e.re, epsilon = 1e-10);
        assert_abs_diff_eq!(a.im, e.im, epsilon = 1e-10);
    }
}

#[test]
fn test_x_on_qubit_zero_two_pieces() {
    init_tracing();
    let mut circuit = distributed(2, 2);
    circuit.add(Gate::x(0)).unwrap();

    let state = circuit.execute(InitialState::Zero).unwrap();
    let expected = reference(2, &[Gate::x(0)], basis_zero(2));
    assert_states_eq(&state, &expected);
    assert_abs_diff_eq!(state[0b10].re, 1.0, epsilon = 1e-12);
}

#[test]
fn test_random_circuits_match_dense_simulation() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(2024);
    let num_qubits = 5;

    for trial in 0..6 {
        let gates = random_circuit(&mut rng, num_qubits, 30);
        let expected = reference(num_qubits, &gates, basis_zero(num_qubits));

        for pieces in [1, 2, 4, 8] {
            let mut circuit = distributed(num_qubits, pieces);
            circuit.add_all(gates.iter().cloned()).unwrap();
            let state = circuit.execute(InitialState::Zero).unwrap();
            assert_states_eq(&state, &expected);
            assert_eq!(
                circuit.final_state().unwrap().len(),
                1 << num_qubits,
                "trial {trial} pieces {pieces}"
            );
        }
    }
}

#[test]
fn test_random_initial_states() {
    let mut rng = StdRng::seed_from_u64(99);
    let num_qubits = 6;
    let gates = random_circuit(&mut rng, num_qubits, 40);

    for pieces in [2, 4, 8] {
        let initial = random_state(&mut rng, num_qubits);
        let expected = reference(num_qubits, &gates, initial.clone());

        let mut circuit = distributed(num_qubits, pieces);
        circuit.add_all(gates.iter().cloned()).unwrap();
        let state = circuit.execute(InitialState::Vector(initial)).unwrap();
        assert_states_eq(&state, &expected);
    }
}

#[test]
fn test_uneven_device_assignment() {
    let mut rng = StdRng::seed_from_u64(5);
    let num_qubits = 5;
    let gates = random_circuit(&mut rng, num_qubits, 25);
    let expected = reference(num_qubits, &gates, basis_zero(num_qubits));

    let devices = DeviceMap::new()
        .with_device("gpu:0", 2)
        .with_device("gpu:1", 1)
        .with_device("gpu:2", 1);
    let mut circuit =
        DistributedCircuit::new(num_qubits, DistributedConfig::with_devices(devices)).unwrap();
    circuit.add_all(gates).unwrap();
    let state = circuit.execute(InitialState::Zero).unwrap();
    assert_states_eq(&state, &expected);
}

#[test]
fn test_sequential_devices_match() {
    let mut rng = StdRng::seed_from_u64(17);
    let num_qubits = 5;
    let gates = random_circuit(&mut rng, num_qubits, 25);
    let expected = reference(num_qubits, &gates, basis_zero(num_qubits));

    let config = DistributedConfig::debug(DeviceMap::uniform("cpu", 4));
    let mut circuit = DistributedCircuit::new(num_qubits, config).unwrap();
    circuit.add_all(gates).unwrap();
    let state = circuit.execute(InitialState::Zero).unwrap();
    assert_states_eq(&state, &expected);
}

#[test]
fn test_global_controls() {
    // qubits 3 and 4 are global in the second group, where they only control
    let gates = vec![
        Gate::x(3),
        Gate::x(4),
        Gate::h(0),
        Gate::cnot(3, 1).unwrap(),
        Gate::toffoli(3, 4, 2).unwrap(),
        Gate::crz(4, 0, 0.8).unwrap(),
    ];
    let expected = reference(5, &gates, basis_zero(5));

    let mut circuit = distributed(5, 4);
    circuit.add_all(gates).unwrap();
    let state = circuit.execute(InitialState::Zero).unwrap();
    assert_states_eq(&state, &expected);
}

#[test]
fn test_two_group_schedule_and_state() {
    let mut circuit = distributed(3, 2);
    circuit
        .add_all([Gate::h(0), Gate::h(1), Gate::h(2), Gate::h(0)])
        .unwrap();

    let schedule = circuit.schedule().unwrap();
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule.groups()[0].global_qubits(), &[2]);
    assert_eq!(schedule.groups()[0].len(), 2);
    assert_eq!(schedule.groups()[1].global_qubits(), &[1]);
    assert_eq!(schedule.groups()[1].len(), 2);

    let state = circuit.execute(InitialState::Zero).unwrap();
    // H(0) twice cancels: qubit 0 back to |0>, qubits 1 and 2 in |+>
    for (index, amp) in state.iter().enumerate() {
        let want = if index & 0b100 == 0 { 0.5 } else { 0.0 };
        assert_abs_diff_eq!(amp.re, want, epsilon = 1e-12);
    }
    assert_eq!(circuit.global_qubits().unwrap(), &[1]);
}

#[test]
fn test_boundary_errors() {
    let circuit = distributed(3, 2);
    assert_eq!(circuit.global_qubits().unwrap_err().kind(), ErrorKind::State);
    assert_eq!(circuit.final_state().unwrap_err().kind(), ErrorKind::State);

    let err = DistributedCircuit::new(
        3,
        DistributedConfig::with_devices(DeviceMap::uniform("cpu", 3)),
    )
    .unwrap_err();
    assert_eq!(err, DistributedError::InvalidDeviceCount { devices: 3 });
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_wide_gate_is_configuration_error() {
    let mut circuit = distributed(3, 4);
    circuit.add(Gate::swap(0, 1).unwrap()).unwrap();
    let err = circuit.execute(InitialState::Zero).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!circuit.is_initialized());
}

#[test]
fn test_reexecute_after_reset_with_new_input() {
    let mut circuit = distributed(3, 2);
    circuit.add(Gate::x(1)).unwrap();

    let first = circuit.execute(InitialState::Zero).unwrap();
    assert_abs_diff_eq!(first[0b010].re, 1.0, epsilon = 1e-12);

    circuit.reset();
    let mut initial = vec![Complex64::new(0.0, 0.0); 8];
    initial[0b010] = Complex64::new(1.0, 0.0);
    let second = circuit.execute(InitialState::Vector(initial)).unwrap();
    assert_abs_diff_eq!(second[0b000].re, 1.0, epsilon = 1e-12);
}

#[test]
fn test_adding_gates_reschedules() {
    let mut circuit = distributed(3, 2);
    circuit.add(Gate::h(0)).unwrap();
    assert_eq!(circuit.schedule().unwrap().gate_count(), 1);

    circuit.add(Gate::h(2)).unwrap();
    assert_eq!(circuit.schedule().unwrap().gate_count(), 2);
}

/// Thread-pool backend whose first round reports a failure on device 1
struct FlakyBackend {
    inner: ThreadPoolBackend,
    rounds: Arc<AtomicUsize>,
}

impl DeviceBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn devices(&self) -> &DeviceMap {
        self.inner.devices()
    }

    fn run_on_device<'a>(&self, device: usize, job: DeviceJob<'a>) -> shardq_sim::Result<()> {
        self.inner.run_on_device(device, job)
    }

    fn join_all<'a>(&self, jobs: Vec<DeviceJob<'a>>) -> Vec<shardq_sim::Result<()>> {
        let round = self.rounds.fetch_add(1, Ordering::SeqCst);
        let mut results = self.inner.join_all(jobs);
        if round == 0 {
            results[1] = Err(DistributedError::DeviceTask {
                device: "cpu:1".to_string(),
                piece: 1,
                gate: "H(q0)".to_string(),
                reason: "device lost".to_string(),
            });
        }
        results
    }
}

#[test]
fn test_device_failure_stops_later_groups() {
    init_tracing();
    let devices = DeviceMap::uniform("cpu", 2);
    let rounds = Arc::new(AtomicUsize::new(0));
    let backend = FlakyBackend {
        inner: ThreadPoolBackend::new(devices.clone()),
        rounds: Arc::clone(&rounds),
    };
    let mut circuit =
        DistributedCircuit::with_backend(3, DistributedConfig::with_devices(devices), backend)
            .unwrap();
    circuit
        .add_all([Gate::h(0), Gate::h(1), Gate::h(2), Gate::h(0)])
        .unwrap();
    assert_eq!(circuit.schedule().unwrap().len(), 2);

    let err = circuit.execute(InitialState::Zero).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceTask);
    assert_eq!(rounds.load(Ordering::SeqCst), 1);
    assert!(!circuit.is_initialized());
    assert_eq!(circuit.final_state().unwrap_err().kind(), ErrorKind::State);

    let state = circuit.execute(InitialState::Zero).unwrap();
    assert_eq!(rounds.load(Ordering::SeqCst), 3);
    for (index, amp) in state.iter().enumerate() {
        let want = if index & 0b100 == 0 { 0.5 } else { 0.0 };
        assert_abs_diff_eq!(amp.re, want, epsilon = 1e-12);
    }
}
