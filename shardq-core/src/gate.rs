//! Quantum gate definitions
//!
//! Gates are a tagged variant: a [`GateKind`] describing the operator acting
//! on the target qubits, plus an optional list of control qubits. Controlled
//! gates such as CNOT or Toffoli are the base kind with controls attached, so
//! every gate exposes the same three pieces of information the distributed
//! engine needs: targets, controls and a target-space matrix.

use crate::{matrices, QuantumError, QubitId, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Operator applied to the target qubits of a [`Gate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateKind {
    H,
    X,
    Y,
    Z,
    S,
    T,
    RX { theta: f64 },
    RY { theta: f64 },
    RZ { theta: f64 },
    U1 { theta: f64 },
    SWAP,
    /// Arbitrary unitary, row-major `2^k x 2^k` over `k` targets
    Unitary { name: String, matrix: Vec<Complex64> },
}

impl GateKind {
    /// Short name of the operator
    pub fn name(&self) -> &str {
        match self {
            GateKind::H => "H",
            GateKind::X => "X",
            GateKind::Y => "Y",
            GateKind::Z => "Z",
            GateKind::S => "S",
            GateKind::T => "T",
            GateKind::RX { .. } => "RX",
            GateKind::RY { .. } => "RY",
            GateKind::RZ { .. } => "RZ",
            GateKind::U1 { .. } => "U1",
            GateKind::SWAP => "SWAP",
            GateKind::Unitary { name, .. } => name,
        }
    }

    /// Number of target qubits the operator acts on
    pub fn num_targets(&self) -> usize {
        match self {
            GateKind::SWAP => 2,
            GateKind::Unitary { matrix, .. } => {
                let dim = (matrix.len() as f64).sqrt() as usize;
                dim.max(1).trailing_zeros() as usize
            }
            _ => 1,
        }
    }

    /// Rotation angle, if the operator is parameterized
    pub fn parameter(&self) -> Option<f64> {
        match self {
            GateKind::RX { theta }
            | GateKind::RY { theta }
            | GateKind::RZ { theta }
            | GateKind::U1 { theta } => Some(*theta),
            _ => None,
        }
    }

    /// Row-major matrix over the targets
    pub fn matrix(&self) -> Vec<Complex64> {
        match self {
            GateKind::H => matrices::flatten(&matrices::HADAMARD),
            GateKind::X => matrices::flatten(&matrices::PAULI_X),
            GateKind::Y => matrices::flatten(&matrices::PAULI_Y),
            GateKind::Z => matrices::flatten(&matrices::PAULI_Z),
            GateKind::S => matrices::flatten(&matrices::S_GATE),
            GateKind::T => matrices::flatten(&matrices::T_GATE),
            GateKind::RX { theta } => matrices::flatten(&matrices::rotation_x(*theta)),
            GateKind::RY { theta } => matrices::flatten(&matrices::rotation_y(*theta)),
            GateKind::RZ { theta } => matrices::flatten(&matrices::rotation_z(*theta)),
            GateKind::U1 { theta } => matrices::flatten(&matrices::u1(*theta)),
            GateKind::SWAP => matrices::flatten(&matrices::SWAP),
            GateKind::Unitary { matrix, .. } => matrix.clone(),
        }
    }
}

/// A gate bound to target and control qubits
///
/// # Example
/// ```
/// use shardq_core::{Gate, GateKind, QubitId};
///
/// let crz = Gate::new(GateKind::RZ { theta: 0.5 }, &[QubitId::new(2)])
///     .unwrap()
///     .controlled_by(&[QubitId::new(0)])
///     .unwrap();
/// assert_eq!(crz.name(), "CRZ");
/// assert_eq!(crz.qubits().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    kind: GateKind,
    targets: SmallVec<[QubitId; 2]>,
    controls: SmallVec<[QubitId; 2]>,
}

impl Gate {
    /// Create a gate acting on `targets`
    ///
    /// # Errors
    /// Returns error if the target count does not match the operator, if a
    /// qubit is repeated, or if a unitary matrix is not `4^k` long.
    pub fn new(kind: GateKind, targets: &[QubitId]) -> Result<Self> {
        if let GateKind::Unitary { name, matrix } = &kind {
            let expected = 1usize << (2 * targets.len());
            if matrix.len() != expected {
                return Err(QuantumError::InvalidMatrix {
                    gate: name.clone(),
                    expected,
                    actual: matrix.len(),
                });
            }
        }
        if targets.len() != kind.num_targets() {
            return Err(QuantumError::invalid_qubit_count(
                kind.name(),
                kind.num_targets(),
                targets.len(),
            ));
        }
        check_distinct(targets)?;

        Ok(Self {
            kind,
            targets: SmallVec::from_slice(targets),
            controls: SmallVec::new(),
        })
    }

    fn single(kind: GateKind, q: usize) -> Self {
        Self {
            kind,
            targets: smallvec::smallvec![QubitId::new(q)],
            controls: SmallVec::new(),
        }
    }

    pub fn h(q: usize) -> Self {
        Self::single(GateKind::H, q)
    }

    pub fn x(q: usize) -> Self {
        Self::single(GateKind::X, q)
    }

    pub fn y(q: usize) -> Self {
        Self::single(GateKind::Y, q)
    }

    pub fn z(q: usize) -> Self {
        Self::single(GateKind::Z, q)
    }

    pub fn s(q: usize) -> Self {
        Self::single(GateKind::S, q)
    }

    pub fn t(q: usize) -> Self {
        Self::single(GateKind::T, q)
    }

    pub fn rx(q: usize, theta: f64) -> Self {
        Self::single(GateKind::RX { theta }, q)
    }

    pub fn ry(q: usize, theta: f64) -> Self {
        Self::single(GateKind::RY { theta }, q)
    }

    pub fn rz(q: usize, theta: f64) -> Self {
        Self::single(GateKind::RZ { theta }, q)
    }

    pub fn u1(q: usize, theta: f64) -> Self {
        Self::single(GateKind::U1 { theta }, q)
    }

    /// Controlled-NOT: X on `target` controlled by `control`
    pub fn cnot(control: usize, target: usize) -> Result<Self> {
        Self::x(target).controlled_by(&[QubitId::new(control)])
    }

    /// Controlled-Z
    pub fn cz(control: usize, target: usize) -> Result<Self> {
        Self::z(target).controlled_by(&[QubitId::new(control)])
    }

    /// Controlled RZ rotation
    pub fn crz(control: usize, target: usize, theta: f64) -> Result<Self> {
        Self::rz(target, theta).controlled_by(&[QubitId::new(control)])
    }

    pub fn swap(q0: usize, q1: usize) -> Result<Self> {
        Self::new(GateKind::SWAP, &[QubitId::new(q0), QubitId::new(q1)])
    }

    /// Toffoli: X on `target` controlled by `c0` and `c1`
    pub fn toffoli(c0: usize, c1: usize, target: usize) -> Result<Self> {
        Self::x(target).controlled_by(&[QubitId::new(c0), QubitId::new(c1)])
    }

    /// Arbitrary unitary over `targets`
    pub fn unitary(name: impl Into<String>, matrix: Vec<Complex64>, targets: &[usize]) -> Result<Self> {
        let targets: Vec<QubitId> = targets.iter().copied().map(QubitId::new).collect();
        Self::new(
            GateKind::Unitary {
                name: name.into(),
                matrix,
            },
            &targets,
        )
    }

    /// Return a copy of this gate with additional control qubits
    ///
    /// # Errors
    /// Returns error if a control repeats a target or another control.
    pub fn controlled_by(mut self, controls: &[QubitId]) -> Result<Self> {
        self.controls.extend_from_slice(controls);
        check_distinct(&self.qubits())?;
        Ok(self)
    }

    /// Copy of this gate with the same operator on different qubits
    ///
    /// The original is left untouched. Used to move a gate into another index
    /// space, e.g. the local space of one state piece.
    pub fn reindexed(&self, targets: &[QubitId], controls: &[QubitId]) -> Result<Self> {
        if targets.len() != self.targets.len() {
            return Err(QuantumError::invalid_qubit_count(
                self.kind.name(),
                self.targets.len(),
                targets.len(),
            ));
        }
        let gate = Self {
            kind: self.kind.clone(),
            targets: SmallVec::from_slice(targets),
            controls: SmallVec::from_slice(controls),
        };
        check_distinct(&gate.qubits())?;
        Ok(gate)
    }

    #[inline]
    pub fn kind(&self) -> &GateKind {
        &self.kind
    }

    #[inline]
    pub fn targets(&self) -> &[QubitId] {
        &self.targets
    }

    #[inline]
    pub fn controls(&self) -> &[QubitId] {
        &self.controls
    }

    /// Controls followed by targets
    pub fn qubits(&self) -> SmallVec<[QubitId; 4]> {
        self.controls.iter().chain(self.targets.iter()).copied().collect()
    }

    /// Highest qubit index touched by this gate
    pub fn max_qubit(&self) -> usize {
        self.qubits().iter().map(|q| q.index()).max().unwrap_or(0)
    }

    /// Display name, using the conventional names for common controlled gates
    pub fn name(&self) -> String {
        match (&self.kind, self.controls.len()) {
            (kind, 0) => kind.name().to_string(),
            (GateKind::X, 1) => "CNOT".to_string(),
            (GateKind::X, 2) => "TOFFOLI".to_string(),
            (GateKind::Z, 1) => "CZ".to_string(),
            (kind, 1) => format!("C{}", kind.name()),
            (kind, n) => format!("C{}-{}", n, kind.name()),
        }
    }

    /// Row-major matrix over the targets (controls excluded)
    pub fn matrix(&self) -> Vec<Complex64> {
        self.kind.matrix()
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, q) in self.qubits().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", q)?;
        }
        write!(f, ")")
    }
}

fn check_distinct(qubits: &[QubitId]) -> Result<()> {
    for i in 0..qubits.len() {
        for j in (i + 1)..qubits.len() {
            if qubits[i] == qubits[j] {
                return Err(QuantumError::DuplicateQubit(qubits[i]));
            }
        }
    }
    Ok(())
}
