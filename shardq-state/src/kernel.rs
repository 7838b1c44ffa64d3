//! Dense gate application on a single state buffer
//!
//! Applies a `2^k x 2^k` matrix to `k` target qubits, conditioned on every
//! control qubit being |1⟩. Qubit `0` is the most significant bit of an index;
//! within the matrix the first target is the most significant bit.

use crate::error::{Result, StateError};
use num_complex::Complex64;
use shardq_core::Gate;
use smallvec::SmallVec;

/// Apply `gate` to `amplitudes`, a state of `num_qubits` qubits
pub fn apply_gate(amplitudes: &mut [Complex64], num_qubits: usize, gate: &Gate) -> Result<()> {
    let targets: SmallVec<[usize; 4]> = gate.targets().iter().map(|q| q.index()).collect();
    let controls: SmallVec<[usize; 4]> = gate.controls().iter().map(|q| q.index()).collect();
    apply_matrix(amplitudes, num_qubits, &targets, &controls, &gate.matrix())
}

/// Apply a row-major matrix to `targets` with `controls`
///
/// # Errors
/// Returns error if the buffer length is not `2^num_qubits`, a qubit is out of
/// range or repeated, or the matrix does not match the target count.
pub fn apply_matrix(
    amplitudes: &mut [Complex64],
    num_qubits: usize,
    targets: &[usize],
    controls: &[usize],
    matrix: &[Complex64],
) -> Result<()> {
    let dimension = 1usize << num_qubits;
    if amplitudes.len() != dimension {
        return Err(StateError::DimensionMismatch {
            expected: dimension,
            actual: amplitudes.len(),
        });
    }

    let sub_dim = 1usize << targets.len();
    if matrix.len() != sub_dim * sub_dim {
        return Err(StateError::DimensionMismatch {
            expected: sub_dim * sub_dim,
            actual: matrix.len(),
        });
    }

    let mut used = 0usize;
    for &q in targets.iter().chain(controls.iter()) {
        if q >= num_qubits {
            return Err(StateError::InvalidQubitIndex {
                index: q,
                num_qubits,
            });
        }
        let mask = 1usize << (num_qubits - 1 - q);
        if used & mask != 0 {
            return Err(StateError::DuplicateQubit {
                index: q,
                context: "gate qubits",
            });
        }
        used |= mask;
    }

    let control_mask = controls
        .iter()
        .fold(0usize, |m, &q| m | 1 << (num_qubits - 1 - q));
    let target_masks: SmallVec<[usize; 4]> = targets
        .iter()
        .map(|&q| 1usize << (num_qubits - 1 - q))
        .collect();
    let target_mask = target_masks.iter().fold(0, |m, &t| m | t);

    // offsets[s]: index displacement for sub-index s, first target most significant
    let k = targets.len();
    let offsets: Vec<usize> = (0..sub_dim)
        .map(|s| {
            (0..k)
                .filter(|&t| s & (1 << (k - 1 - t)) != 0)
                .fold(0, |acc, t| acc | target_masks[t])
        })
        .collect();

    if k == 1 {
        apply_single_target(amplitudes, target_mask, control_mask, matrix);
        return Ok(());
    }

    let mut gathered = vec![Complex64::new(0.0, 0.0); sub_dim];
    for base in 0..dimension {
        if base & target_mask != 0 || base & control_mask != control_mask {
            continue;
        }
        for (s, value) in gathered.iter_mut().enumerate() {
            *value = amplitudes[base | offsets[s]];
        }
        for (row, &offset) in offsets.iter().enumerate() {
            let mut sum = Complex64::new(0.0, 0.0);
            for (col, value) in gathered.iter().enumerate() {
                sum += matrix[row * sub_dim + col] * *value;
            }
            amplitudes[base | offset] = sum;
        }
    }

    Ok(())
}

#[inline]
fn apply_single_target(
    amplitudes: &mut [Complex64],
    target_mask: usize,
    control_mask: usize,
    matrix: &[Complex64],
) {
    let (m00, m01, m10, m11) = (matrix[0], matrix[1], matrix[2], matrix[3]);
    let stride = target_mask;
    let mut i = 0;
    while i < amplitudes.len() {
        for idx0 in i..i + stride {
            if idx0 & control_mask != control_mask {
                continue;
            }
            let idx1 = idx0 + stride;
            let a = amplitudes[idx0];
            let b = amplitudes[idx1];
            amplitudes[idx0] = m00 * a + m01 * b;
            amplitudes[idx1] = m10 * a + m11 * b;
        }
        i += stride * 2;
    }
}

/// Squared norm of a buffer
pub fn norm_sqr(amplitudes: &[Complex64]) -> f64 {
    amplitudes.iter().map(|a| a.norm_sqr()).sum()
}
