//! Grouping a gate sequence into rounds with a fixed global-qubit set
//!
//! A group is a run of consecutive gates whose targets all stay local while
//! its global qubits are global. Between groups the pieces are swapped to the
//! next global set.

use crate::config::DeviceMap;
use crate::error::{DistributedError, Result};
use crate::reduce::{reduce, ReducedGate};
use shardq_core::Gate;
use shardq_state::Layout;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Gates that run under one global-qubit set
#[derive(Debug, Clone)]
pub struct ScheduleGroup {
    global_qubits: Vec<usize>,
    gates: Vec<Arc<Gate>>,
}

impl ScheduleGroup {
    /// Sorted global qubits of this group
    #[inline]
    pub fn global_qubits(&self) -> &[usize] {
        &self.global_qubits
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
}

/// Ordered, immutable list of schedule groups
#[derive(Debug, Clone)]
pub struct Schedule {
    num_qubits: usize,
    num_global: usize,
    groups: Vec<ScheduleGroup>,
}

impl Schedule {
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    #[inline]
    pub fn num_global(&self) -> usize {
        self.num_global
    }

    #[inline]
    pub fn groups(&self) -> &[ScheduleGroup] {
        &self.groups
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Global set of the first group, the partition the state starts in
    pub fn initial_global_qubits(&self) -> &[usize] {
        self.groups
            .first()
            .map(|g| g.global_qubits.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of scheduled gates
    pub fn gate_count(&self) -> usize {
        self.groups.iter().map(ScheduleGroup::len).sum()
    }

    /// Number of swaps an execution performs
    pub fn swap_count(&self) -> usize {
        self.groups
            .windows(2)
            .filter(|w| w[0].global_qubits != w[1].global_qubits)
            .count()
    }

    /// Reduce every group for its layout and copy the result to every device
    ///
    /// # Errors
    /// Returns error if a gate cannot be reduced for its group's layout.
    pub fn device_queues(&self, devices: &DeviceMap) -> Result<DeviceQueues> {
        let reduced = self
            .groups
            .iter()
            .map(|group| {
                let layout = Layout::new(self.num_qubits, &group.global_qubits)?;
                group
                    .gates
                    .iter()
                    .map(|gate| reduce(gate, &layout))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let queues = devices
            .iter()
            .map(|(name, _)| DeviceQueue {
                device: name.to_string(),
                groups: reduced.clone(),
            })
            .collect();
        Ok(DeviceQueues { queues })
    }
}

/// Reduced gates for one device, one list per group
#[derive(Debug, Clone)]
pub struct DeviceQueue {
    device: String,
    groups: Vec<Vec<ReducedGate>>,
}

impl DeviceQueue {
    #[inline]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Queue for one group, empty if the group does not exist
    pub fn group(&self, index: usize) -> &[ReducedGate] {
        self.groups.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }
}

/// Per-device queues, indexed by device slot
#[derive(Debug, Clone)]
pub struct DeviceQueues {
    queues: Vec<DeviceQueue>,
}

impl DeviceQueues {
    pub fn get(&self, device: usize) -> Option<&DeviceQueue> {
        self.queues.get(device)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceQueue> {
        self.queues.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

/// Builds a [`Schedule`] for a fixed register size and global-qubit count
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    num_qubits: usize,
    num_global: usize,
}

impl Scheduler {
    pub fn new(num_qubits: usize, num_global: usize) -> Self {
        Self {
            num_qubits,
            num_global,
        }
    }

    /// Group `gates` in a single pass
    ///
    /// Targets of each gate are struck from a candidate set that starts as all
    /// qubits. Gates join the current group while more than `G` candidates
    /// remain. At exactly `G` the group keeps absorbing gates whose targets
    /// avoid the candidates. Below `G` the candidates are topped up from the
    /// current gate's lowest targets and that gate opens the next group.
    ///
    /// # Errors
    /// Returns error if `gates` is empty or a gate has more targets than
    /// there are local qubits.
    pub fn build(&self, gates: &[Arc<Gate>]) -> Result<Schedule> {
        let n = self.num_qubits;
        let g = self.num_global;
        if g > n {
            return Err(DistributedError::GlobalQubitCount {
                expected: n,
                actual: g,
                devices: 1 << g,
            });
        }
        if gates.is_empty() {
            return Err(DistributedError::EmptyCircuit);
        }
        if let Some(gate) = gates.iter().find(|gate| gate.targets().len() > n - g) {
            return Err(DistributedError::GateTooWide {
                gate: gate.to_string(),
                targets: gate.targets().len(),
                local: n - g,
            });
        }

        let all: BTreeSet<usize> = (0..n).collect();
        let mut groups = Vec::new();
        let mut current: Vec<Arc<Gate>> = Vec::new();
        let mut candidate = all.clone();
        let mut next = 0;

        'outer: loop {
            let mut removed = strike_targets(&mut candidate, &gates[next]);

            while candidate.len() > g {
                current.push(Arc::clone(&gates[next]));
                next += 1;
                if next == gates.len() {
                    break 'outer;
                }
                removed = strike_targets(&mut candidate, &gates[next]);
            }

            if candidate.len() == g {
                current.push(Arc::clone(&gates[next]));
                next += 1;
                if next == gates.len() {
                    break 'outer;
                }
                while !targets_hit(&candidate, &gates[next]) {
                    current.push(Arc::clone(&gates[next]));
                    next += 1;
                    if next == gates.len() {
                        break 'outer;
                    }
                }
            } else {
                let missing = g - candidate.len();
                candidate.extend(removed.into_iter().take(missing));
            }

            debug!(
                group = groups.len(),
                gates = current.len(),
                global = ?candidate,
                "schedule group closed"
            );
            groups.push(ScheduleGroup {
                global_qubits: candidate.iter().copied().collect(),
                gates: std::mem::take(&mut current),
            });
            candidate = all.clone();
        }

        let global_qubits: Vec<usize> = candidate.into_iter().take(g).collect();
        groups.push(ScheduleGroup {
            global_qubits,
            gates: current,
        });

        let schedule = Schedule {
            num_qubits: n,
            num_global: g,
            groups,
        };
        info!(
            gates = schedule.gate_count(),
            groups = schedule.len(),
            swaps = schedule.swap_count(),
            "schedule built"
        );
        Ok(schedule)
    }
}

/// Remove the gate's targets from `candidate`, returning those that were present, ascending
fn strike_targets(candidate: &mut BTreeSet<usize>, gate: &Gate) -> BTreeSet<usize> {
    gate.targets()
        .iter()
        .map(|q| q.index())
        .filter(|q| candidate.remove(q))
        .collect()
}

fn targets_hit(candidate: &BTreeSet<usize>, gate: &Gate) -> bool {
    gate.targets().iter().any(|q| candidate.contains(&q.index()))
}
