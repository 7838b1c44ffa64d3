//! Gate reduction into the local index space of a piece
//!
//! Under a layout with `G` global qubits every piece is a `(N - G)`-qubit
//! state. A local qubit `q` becomes `q - |{g in globals : g < q}|`. Global
//! controls leave the index space and turn into a condition on the piece id.

use crate::error::{DistributedError, Result};
use shardq_core::{Gate, QuantumError, QubitId};
use shardq_state::{kernel, Layout, Piece};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// A gate rewritten for one layout
#[derive(Debug, Clone)]
pub struct ReducedGate {
    original: Arc<Gate>,
    local: Gate,
    num_local: usize,
    piece_mask: usize,
}

impl ReducedGate {
    /// Gate as added to the circuit
    #[inline]
    pub fn original(&self) -> &Gate {
        &self.original
    }

    /// Gate acting on the local qubits of a piece
    #[inline]
    pub fn local(&self) -> &Gate {
        &self.local
    }

    /// Qubit count of the local index space
    #[inline]
    pub fn num_local(&self) -> usize {
        self.num_local
    }

    /// Piece-id bits that must all be set for the gate to act
    #[inline]
    pub fn piece_mask(&self) -> usize {
        self.piece_mask
    }

    /// Whether the gate touches the piece with this id
    #[inline]
    pub fn applies_to(&self, piece_id: usize) -> bool {
        piece_id & self.piece_mask == self.piece_mask
    }

    /// Apply to a piece in place
    pub fn apply(&self, piece: &mut Piece) -> shardq_state::Result<()> {
        if !self.applies_to(piece.id()) {
            return Ok(());
        }
        kernel::apply_gate(piece.amplitudes_mut(), self.num_local, &self.local)
    }
}

impl fmt::Display for ReducedGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.original, self.local)?;
        if self.piece_mask != 0 {
            write!(f, " [pieces & {:#b}]", self.piece_mask)?;
        }
        Ok(())
    }
}

/// Reduce `gate` for `layout`
///
/// The original is shared, not copied, and never mutated.
///
/// # Errors
/// Returns error if a qubit is out of range or a target is global.
pub fn reduce(gate: &Arc<Gate>, layout: &Layout) -> Result<ReducedGate> {
    let num_global = layout.num_global();

    let targets = gate
        .targets()
        .iter()
        .map(|q| {
            check_range(q.index(), layout)?;
            layout
                .local_index(q.index())
                .map(QubitId::new)
                .ok_or_else(|| DistributedError::GlobalTarget {
                    gate: gate.name(),
                    qubit: q.index(),
                    global: layout.global_qubits().to_vec(),
                })
        })
        .collect::<Result<SmallVec<[QubitId; 4]>>>()?;

    let mut controls: SmallVec<[QubitId; 4]> = SmallVec::new();
    let mut piece_mask = 0usize;
    for q in gate.controls() {
        check_range(q.index(), layout)?;
        match layout.global_position(q.index()) {
            // first global qubit is the most significant bit of the piece id
            Some(position) => piece_mask |= 1 << (num_global - 1 - position),
            None => {
                if let Some(local) = layout.local_index(q.index()) {
                    controls.push(QubitId::new(local));
                }
            }
        }
    }

    let local = gate.reindexed(&targets, &controls)?;
    Ok(ReducedGate {
        original: Arc::clone(gate),
        local,
        num_local: layout.num_local(),
        piece_mask,
    })
}

fn check_range(qubit: usize, layout: &Layout) -> Result<()> {
    if qubit >= layout.num_qubits() {
        return Err(QuantumError::invalid_qubit(qubit, layout.num_qubits()).into());
    }
    Ok(())
}
