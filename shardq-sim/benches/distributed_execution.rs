//! Benchmark distributed execution against piece count

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use num_complex::Complex64;
use shardq_core::Gate;
use shardq_sim::{DeviceMap, DistributedCircuit, DistributedConfig, InitialState};
use shardq_state::{Layout, StateArena};

fn layered_circuit(num_qubits: usize, depth: usize) -> Vec<Gate> {
    let mut gates = Vec::new();
    for d in 0..depth {
        for q in 0..num_qubits {
            gates.push(Gate::ry(q, 0.1 * (d + q + 1) as f64));
        }
        for q in 0..num_qubits - 1 {
            gates.push(Gate::cnot(q, q + 1).unwrap());
        }
    }
    gates
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("DistributedExecute");
    group.sample_size(10);
    let qubit_sizes = [12, 16, 18];
    let piece_counts = [1, 2, 4, 8];
    let depth = 4;

    for &num_qubits in &qubit_sizes {
        let gates = layered_circuit(num_qubits, depth);
        for &pieces in &piece_counts {
            let config = DistributedConfig::with_devices(DeviceMap::uniform("cpu", pieces))
                .with_norm_validation(false, 0.0)
                .with_telemetry(false);
            let mut circuit = DistributedCircuit::new(num_qubits, config).unwrap();
            circuit.add_all(gates.iter().cloned()).unwrap();
            circuit.schedule().unwrap();

            let label = format!("{}pieces", pieces);
            group.bench_with_input(BenchmarkId::new(label, num_qubits), &num_qubits, |b, &_| {
                b.iter(|| {
                    circuit.reset();
                    circuit.execute(InitialState::Zero).unwrap()
                })
            });
        }
    }
    group.finish();
}

fn bench_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("PieceSwap");
    for &num_qubits in &[12usize, 16, 20] {
        let state: Vec<Complex64> = (0..1usize << num_qubits)
            .map(|i| Complex64::new(i as f64, 0.0))
            .collect();
        let mut arena =
            StateArena::split(&state, Layout::trailing(num_qubits, 3).unwrap()).unwrap();
        let layouts = [vec![0, 1, 2], vec![num_qubits - 3, num_qubits - 2, num_qubits - 1]];
        let mut flip = 0;

        group.bench_with_input(BenchmarkId::new("swap_3_globals", num_qubits), &num_qubits, |b, &_| {
            b.iter(|| {
                flip ^= 1;
                arena.swap(&layouts[flip]).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_execute, bench_swap);
criterion_main!(benches);
