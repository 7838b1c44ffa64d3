//! Qubit-axis permutations between the full register and its partitioned layout
//!
//! A [`Layout`] fixes which qubits are global. Its transpose order lists the
//! sorted global qubits followed by the ascending local qubits; applying it to
//! the `N` bit-axes of a full state makes the global qubits the leading axes,
//! so the leading `G` bits of a transposed index are the piece id.

use crate::error::{Result, StateError};

/// Partition of a register into global and local qubits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    num_qubits: usize,
    global: Vec<usize>,
    local: Vec<usize>,
    order: Vec<usize>,
    reverse: Vec<usize>,
}

impl Layout {
    /// Build a layout from the given global qubits (any order, no duplicates)
    pub fn new(num_qubits: usize, global_qubits: &[usize]) -> Result<Self> {
        let mut global = global_qubits.to_vec();
        global.sort_unstable();
        for pair in global.windows(2) {
            if pair[0] == pair[1] {
                return Err(StateError::DuplicateQubit {
                    index: pair[0],
                    context: "global qubit set",
                });
            }
        }
        if let Some(&q) = global.iter().find(|&&q| q >= num_qubits) {
            return Err(StateError::InvalidQubitIndex {
                index: q,
                num_qubits,
            });
        }

        let local: Vec<usize> = (0..num_qubits)
            .filter(|q| global.binary_search(q).is_err())
            .collect();
        let order: Vec<usize> = global.iter().chain(local.iter()).copied().collect();
        let reverse = inverse(&order);

        Ok(Self {
            num_qubits,
            global,
            local,
            order,
            reverse,
        })
    }

    /// Last `num_global` qubits, the layout used before a schedule exists
    pub fn trailing(num_qubits: usize, num_global: usize) -> Result<Self> {
        if num_global > num_qubits {
            return Err(StateError::InvalidQubitIndex {
                index: num_global,
                num_qubits,
            });
        }
        let global: Vec<usize> = (num_qubits - num_global..num_qubits).collect();
        Self::new(num_qubits, &global)
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    #[inline]
    pub fn num_global(&self) -> usize {
        self.global.len()
    }

    #[inline]
    pub fn num_local(&self) -> usize {
        self.local.len()
    }

    /// Sorted global qubits
    #[inline]
    pub fn global_qubits(&self) -> &[usize] {
        &self.global
    }

    /// Ascending local qubits
    #[inline]
    pub fn local_qubits(&self) -> &[usize] {
        &self.local
    }

    /// Globals followed by locals
    #[inline]
    pub fn transpose_order(&self) -> &[usize] {
        &self.order
    }

    /// Inverse of [`Layout::transpose_order`]
    #[inline]
    pub fn reverse_transpose_order(&self) -> &[usize] {
        &self.reverse
    }

    pub fn is_global(&self, qubit: usize) -> bool {
        self.global.binary_search(&qubit).is_ok()
    }

    /// Position of `qubit` in the local index space, if it is local
    ///
    /// Equals `qubit` minus the number of global qubits below it.
    pub fn local_index(&self, qubit: usize) -> Option<usize> {
        if qubit >= self.num_qubits || self.is_global(qubit) {
            return None;
        }
        Some(qubit - self.global.partition_point(|&g| g < qubit))
    }

    /// Position of `qubit` among the sorted globals, if it is global
    pub fn global_position(&self, qubit: usize) -> Option<usize> {
        self.global.binary_search(&qubit).ok()
    }

    /// Axis permutation taking pieces laid out for `self` to pieces laid out for `next`
    ///
    /// Entry `j` is the axis of the current stacked buffer that becomes axis
    /// `j` of the new one.
    pub fn swap_order(&self, next: &Layout) -> Vec<usize> {
        next.order.iter().map(|&q| self.reverse[q]).collect()
    }
}

/// Inverse permutation: `order[inverse(order)[i]] == i`
pub fn inverse(order: &[usize]) -> Vec<usize> {
    let mut reverse = vec![0; order.len()];
    for (i, &v) in order.iter().enumerate() {
        reverse[v] = i;
    }
    reverse
}

/// Check that `order` is a permutation of `0..num_qubits`
pub fn validate_permutation(order: &[usize], num_qubits: usize) -> Result<()> {
    let mut seen = vec![false; num_qubits];
    if order.len() != num_qubits {
        return Err(StateError::InvalidPermutation {
            order: order.to_vec(),
            num_qubits,
        });
    }
    for &axis in order {
        if axis >= num_qubits || seen[axis] {
            return Err(StateError::InvalidPermutation {
                order: order.to_vec(),
                num_qubits,
            });
        }
        seen[axis] = true;
    }
    Ok(())
}
