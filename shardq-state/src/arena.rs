//! Partitioned state storage
//!
//! A [`StateArena`] holds the `D` pieces of a `2^N` state vector laid out for
//! one [`Layout`]. Piece `i` holds every amplitude whose global qubits, read
//! in sorted order with the first one most significant, spell `i`.
//!
//! The arena is only touched by the controlling thread: split, merge and swap
//! run between execution rounds, and device tasks receive the pieces through
//! [`StateArena::pieces_mut`] for the duration of one round.

use crate::error::{Result, StateError};
use crate::kernel::norm_sqr;
use crate::permutation::Layout;
use crate::transpose::IndexMap;
use num_complex::Complex64;
use rayon::prelude::*;
use tracing::{debug, instrument};

/// One device-resident partition of the state vector
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    id: usize,
    amplitudes: Vec<Complex64>,
}

impl Piece {
    fn zeros(id: usize, len: usize) -> Self {
        Self {
            id,
            amplitudes: vec![Complex64::new(0.0, 0.0); len],
        }
    }

    /// Piece id in `[0, D)`
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    #[inline]
    pub fn amplitudes_mut(&mut self) -> &mut [Complex64] {
        &mut self.amplitudes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }
}

/// Owner of the pieces of one distributed state
#[derive(Debug)]
pub struct StateArena {
    layout: Layout,
    pieces: Vec<Piece>,
    scratch: Vec<Complex64>,
}

impl StateArena {
    /// Allocate zeroed pieces for `layout`
    pub fn zeros(layout: Layout) -> Self {
        let num_pieces = 1usize << layout.num_global();
        let piece_len = 1usize << layout.num_local();
        let pieces = (0..num_pieces).map(|id| Piece::zeros(id, piece_len)).collect();
        Self {
            layout,
            pieces,
            scratch: Vec::new(),
        }
    }

    /// The |0...0⟩ state, written straight into piece 0
    pub fn basis_zero(layout: Layout) -> Self {
        let mut arena = Self::zeros(layout);
        arena.pieces[0].amplitudes[0] = Complex64::new(1.0, 0.0);
        arena
    }

    /// Split a full state vector into pieces for `layout`
    ///
    /// Transposes the bit-axes of `full_state` by the layout's transpose order
    /// and hands row `i` of the `(D, 2^(N-G))` view to piece `i`.
    ///
    /// # Errors
    /// Returns error if `full_state` does not hold `2^N` amplitudes.
    #[instrument(skip_all, fields(num_qubits = layout.num_qubits(), global = ?layout.global_qubits()))]
    pub fn split(full_state: &[Complex64], layout: Layout) -> Result<Self> {
        let dimension = 1usize << layout.num_qubits();
        if full_state.len() != dimension {
            return Err(StateError::DimensionMismatch {
                expected: dimension,
                actual: full_state.len(),
            });
        }

        let mut arena = Self::zeros(layout);
        let map = IndexMap::new(arena.layout.num_qubits(), arena.layout.transpose_order())?;
        scatter_rows(&map, full_state, &mut arena.pieces);
        debug!(pieces = arena.pieces.len(), "state split");
        Ok(arena)
    }

    /// Reassemble the full `2^N` state vector
    ///
    /// Reads the stacked pieces through the reverse transpose order; the
    /// pieces themselves are left untouched.
    pub fn merge(&self) -> Result<Vec<Complex64>> {
        let num_qubits = self.layout.num_qubits();
        let num_local = self.layout.num_local();
        let local_mask = (1usize << num_local) - 1;
        let map = IndexMap::new(num_qubits, self.layout.reverse_transpose_order())?;

        let mut full = vec![Complex64::new(0.0, 0.0); 1usize << num_qubits];
        let pieces = &self.pieces;
        let read = |o: usize| {
            let i = map.source(o);
            pieces[i >> num_local].amplitudes[i & local_mask]
        };
        if full.len() >= crate::transpose::PARALLEL_THRESHOLD {
            full.par_iter_mut()
                .enumerate()
                .for_each(|(o, amp)| *amp = read(o));
        } else {
            for (o, amp) in full.iter_mut().enumerate() {
                *amp = read(o);
            }
        }
        Ok(full)
    }

    /// Re-lay the pieces out for a new set of global qubits
    ///
    /// The represented state is unchanged. The pieces are stacked into the
    /// scratch buffer, which is allocated on first use and reused afterwards,
    /// and gathered back under the permutation taking the old axis order to
    /// the new one.
    ///
    /// # Errors
    /// Returns error if `new_global` is not a valid global set of the same size.
    #[instrument(skip(self), fields(from = ?self.layout.global_qubits()))]
    pub fn swap(&mut self, new_global: &[usize]) -> Result<()> {
        let next = Layout::new(self.layout.num_qubits(), new_global)?;
        if next.num_global() != self.layout.num_global() {
            return Err(StateError::GlobalQubitCount {
                expected: self.layout.num_global(),
                actual: next.num_global(),
                pieces: self.pieces.len(),
            });
        }
        if next == self.layout {
            debug!("swap skipped, layout unchanged");
            return Ok(());
        }

        let order = self.layout.swap_order(&next);
        let map = IndexMap::new(next.num_qubits(), &order)?;

        let dimension = 1usize << next.num_qubits();
        self.scratch.resize(dimension, Complex64::new(0.0, 0.0));
        let piece_len = 1usize << next.num_local();
        for (piece, row) in self.pieces.iter().zip(self.scratch.chunks_mut(piece_len)) {
            row.copy_from_slice(&piece.amplitudes);
        }

        scatter_rows(&map, &self.scratch, &mut self.pieces);
        self.layout = next;
        debug!(to = ?self.layout.global_qubits(), "pieces swapped");
        Ok(())
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Sorted global qubits of the current layout
    #[inline]
    pub fn global_qubits(&self) -> &[usize] {
        self.layout.global_qubits()
    }

    #[inline]
    pub fn num_pieces(&self) -> usize {
        self.pieces.len()
    }

    #[inline]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Exclusive access to the pieces for one execution round
    #[inline]
    pub fn pieces_mut(&mut self) -> &mut [Piece] {
        &mut self.pieces
    }

    /// Squared norm of the represented state
    pub fn norm_sqr(&self) -> f64 {
        self.pieces.iter().map(|p| norm_sqr(&p.amplitudes)).sum()
    }

    /// Bytes held by pieces and scratch buffer
    pub fn memory_bytes(&self) -> usize {
        let amps: usize = self.pieces.iter().map(Piece::len).sum::<usize>() + self.scratch.len();
        amps * std::mem::size_of::<Complex64>()
    }
}

/// Fill every piece from `input` through `map`, one piece per rayon task
fn scatter_rows(map: &IndexMap, input: &[Complex64], pieces: &mut [Piece]) {
    pieces.par_iter_mut().for_each(|piece| {
        let offset = piece.id * piece.amplitudes.len();
        map.gather_into(input, &mut piece.amplitudes, offset);
    });
}

/// Number of global qubits for `num_pieces` pieces of an `num_qubits`-qubit state
///
/// # Errors
/// Returns error if `num_pieces` is zero, not a power of two, or larger than
/// the state dimension.
pub fn global_qubit_count(num_qubits: usize, num_pieces: usize) -> Result<usize> {
    if num_pieces == 0 || !num_pieces.is_power_of_two() {
        return Err(StateError::InvalidPieceCount {
            pieces: num_pieces,
            num_qubits,
        });
    }
    let num_global = num_pieces.trailing_zeros() as usize;
    if num_global > num_qubits {
        return Err(StateError::InvalidPieceCount {
            pieces: num_pieces,
            num_qubits,
        });
    }
    Ok(num_global)
}
