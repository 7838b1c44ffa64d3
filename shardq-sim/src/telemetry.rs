//! Telemetry for distributed execution

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timings and counters for one execution round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTelemetry {
    pub group: usize,
    pub global_qubits: Vec<usize>,
    /// Gate applications summed over pieces, skipped pieces excluded
    pub gates_applied: usize,
    /// Pieces were swapped to this group's global set before the round
    pub swapped: bool,
    pub swap_time: Duration,
    pub round_time: Duration,
}

/// Telemetry for one `execute` call
#[derive(Debug, Default, Clone)]
pub struct ExecutionTelemetry {
    pub rounds: Vec<RoundTelemetry>,
    /// Device that held the split and merge buffers
    pub memory_device: String,
    pub split_time: Duration,
    pub merge_time: Duration,
    pub total_time: Duration,
    pub peak_memory: usize,
    pub gate_type_counts: HashMap<String, usize>,
    pub error_events: Vec<String>,
    pub custom_events: Vec<(String, Instant)>,
}

impl ExecutionTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_error(&mut self, msg: impl Into<String>) {
        self.error_events.push(msg.into());
    }

    pub fn log_event(&mut self, label: impl Into<String>) {
        self.custom_events.push((label.into(), Instant::now()));
    }

    pub fn inc_gate_type(&mut self, gate_name: &str) {
        *self
            .gate_type_counts
            .entry(gate_name.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_memory(&mut self, bytes: usize) {
        self.peak_memory = self.peak_memory.max(bytes);
    }

    pub fn record_round(&mut self, round: RoundTelemetry) {
        self.rounds.push(round);
    }
}

/// Summary of an [`ExecutionTelemetry`]
#[derive(Debug, Clone)]
pub struct ExecutionMetrics {
    pub rounds: usize,
    pub gates_applied: usize,
    pub swaps: usize,
    pub total_swap_time: Duration,
    pub total_round_time: Duration,
    pub average_round_time: Duration,
    pub total_time: Duration,
}

impl ExecutionMetrics {
    pub fn from_telemetry(telemetry: &ExecutionTelemetry) -> Self {
        let total_round_time: Duration = telemetry.rounds.iter().map(|r| r.round_time).sum();
        let total_swap_time: Duration = telemetry.rounds.iter().map(|r| r.swap_time).sum();

        let average_round_time = if !telemetry.rounds.is_empty() {
            total_round_time / telemetry.rounds.len() as u32
        } else {
            Duration::ZERO
        };

        Self {
            rounds: telemetry.rounds.len(),
            gates_applied: telemetry.rounds.iter().map(|r| r.gates_applied).sum(),
            swaps: telemetry
                .rounds
                .iter()
                .filter(|r| r.swapped)
                .count(),
            total_swap_time,
            total_round_time,
            average_round_time,
            total_time: telemetry.total_time,
        }
    }
}
