//! One execution round: every device applies its queue for a group

use crate::device::{DeviceBackend, DeviceJob};
use crate::error::{DistributedError, Result};
use crate::reduce::ReducedGate;
use crate::schedule::DeviceQueues;
use shardq_state::{Piece, StateArena};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, instrument};

/// Dispatches the per-device gate queues of one group
pub struct ExecutionRound<'a, B: DeviceBackend + ?Sized> {
    backend: &'a B,
    queues: &'a DeviceQueues,
    parallel: bool,
}

impl<'a, B: DeviceBackend + ?Sized> ExecutionRound<'a, B> {
    pub fn new(backend: &'a B, queues: &'a DeviceQueues) -> Self {
        Self {
            backend,
            queues,
            parallel: true,
        }
    }

    /// Builder: run device tasks one after another
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Run group `group` on every device and wait for all of them
    ///
    /// Each device task gets exclusive access to the contiguous pieces the
    /// device owns and applies its queue to them in order. Returns the number
    /// of gate applications performed.
    ///
    /// # Errors
    /// Returns the first failing device task; the pieces are then in an
    /// unspecified state.
    #[instrument(skip(self, arena), fields(parallel = self.parallel))]
    pub fn run(&self, arena: &mut StateArena, group: usize) -> Result<usize> {
        let devices = self.backend.devices();
        if arena.num_pieces() != devices.num_pieces() {
            return Err(DistributedError::InvalidConfig(format!(
                "{} pieces cannot be assigned to devices holding {}",
                arena.num_pieces(),
                devices.num_pieces()
            )));
        }
        if self.queues.len() != devices.len() {
            return Err(DistributedError::InvalidConfig(format!(
                "{} device queues for {} devices",
                self.queues.len(),
                devices.len()
            )));
        }

        let applied = AtomicUsize::new(0);
        let mut rest = arena.pieces_mut();
        let mut jobs: Vec<DeviceJob<'_>> = Vec::with_capacity(devices.len());
        for ((name, range), queue) in devices.piece_ranges().into_iter().zip(self.queues.iter()) {
            let (owned, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            rest = tail;
            debug_assert_eq!(owned.first().map(Piece::id), Some(range.start));
            let gates = queue.group(group);
            let applied = &applied;
            jobs.push(Box::new(move || -> Result<()> {
                let n = run_device(name, owned, gates)?;
                applied.fetch_add(n, Ordering::Relaxed);
                Ok(())
            }));
        }

        if self.parallel {
            for result in self.backend.join_all(jobs) {
                result?;
            }
        } else {
            for (device, job) in jobs.into_iter().enumerate() {
                self.backend.run_on_device(device, job)?;
            }
        }

        let applied = applied.into_inner();
        debug!(group, applied, "round complete");
        Ok(applied)
    }
}

/// Apply `gates` in order to every piece of one device
fn run_device(device: &str, pieces: &mut [Piece], gates: &[ReducedGate]) -> Result<usize> {
    let mut applied = 0;
    for piece in pieces.iter_mut() {
        for gate in gates {
            if !gate.applies_to(piece.id()) {
                continue;
            }
            gate.apply(piece)
                .map_err(|err| DistributedError::DeviceTask {
                    device: device.to_string(),
                    piece: piece.id(),
                    gate: gate.original().to_string(),
                    reason: err.to_string(),
                })?;
            applied += 1;
        }
    }
    Ok(applied)
}
