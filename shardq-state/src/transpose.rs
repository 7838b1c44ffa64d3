//! Bit-axis transposition of dense state buffers
//!
//! A state of `n` qubits is an `n`-axis tensor of shape `(2, ..., 2)`.
//! Transposing with `order` produces the tensor whose axis `j` is input axis
//! `order[j]`, the same convention as `numpy.transpose`.

use crate::error::{Result, StateError};
use crate::permutation::validate_permutation;
use num_complex::Complex64;
use rayon::prelude::*;

const CHUNK_BITS: usize = 8;

/// Minimum output length before the gather is split across threads
pub const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Output-index to input-index map for one axis permutation
///
/// Lookup tables over 8-bit chunks of the output index keep the per-element
/// cost at `ceil(n / 8)` loads regardless of the permutation.
#[derive(Debug, Clone)]
pub struct IndexMap {
    tables: Vec<[usize; 1 << CHUNK_BITS]>,
}

impl IndexMap {
    pub fn new(num_qubits: usize, order: &[usize]) -> Result<Self> {
        validate_permutation(order, num_qubits)?;

        // output bit p (LSB = 0) belongs to axis n-1-p and reads input axis order[n-1-p]
        let source_bit: Vec<usize> = (0..num_qubits)
            .map(|p| num_qubits - 1 - order[num_qubits - 1 - p])
            .collect();

        let num_chunks = (num_qubits + CHUNK_BITS - 1) / CHUNK_BITS;
        let mut tables = vec![[0usize; 1 << CHUNK_BITS]; num_chunks];
        for (chunk, table) in tables.iter_mut().enumerate() {
            for (value, entry) in table.iter_mut().enumerate() {
                let mut index = 0;
                for bit in 0..CHUNK_BITS {
                    let p = chunk * CHUNK_BITS + bit;
                    if p < num_qubits && value & (1 << bit) != 0 {
                        index |= 1 << source_bit[p];
                    }
                }
                *entry = index;
            }
        }

        Ok(Self { tables })
    }

    /// Input index feeding output index `output`
    #[inline]
    pub fn source(&self, output: usize) -> usize {
        let mut index = 0;
        for (chunk, table) in self.tables.iter().enumerate() {
            index |= table[(output >> (chunk * CHUNK_BITS)) & ((1 << CHUNK_BITS) - 1)];
        }
        index
    }

    /// Fill `output`, which holds output indices starting at `offset`
    pub fn gather_into(&self, input: &[Complex64], output: &mut [Complex64], offset: usize) {
        if output.len() >= PARALLEL_THRESHOLD {
            output
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, amp)| *amp = input[self.source(offset + i)]);
        } else {
            for (i, amp) in output.iter_mut().enumerate() {
                *amp = input[self.source(offset + i)];
            }
        }
    }
}

/// Transpose the bit-axes of `input` into `output`
///
/// # Errors
/// Returns error if `order` is not a permutation of `0..num_qubits` or if a
/// buffer does not hold `2^num_qubits` amplitudes.
pub fn transpose_state(
    input: &[Complex64],
    num_qubits: usize,
    order: &[usize],
    output: &mut [Complex64],
) -> Result<()> {
    let dimension = 1usize << num_qubits;
    for len in [input.len(), output.len()] {
        if len != dimension {
            return Err(StateError::DimensionMismatch {
                expected: dimension,
                actual: len,
            });
        }
    }
    IndexMap::new(num_qubits, order)?.gather_into(input, output, 0);
    Ok(())
}
