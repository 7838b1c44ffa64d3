//! Distributed execution configuration

use crate::error::{DistributedError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Ordered map from device name to the number of pieces it holds
///
/// Pieces are assigned to devices contiguously in insertion order: with
/// `{"gpu:0": 2, "gpu:1": 2}` the first device owns pieces 0 and 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMap {
    devices: Vec<(String, usize)>,
}

impl DeviceMap {
    /// Create an empty device map
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Single device holding `pieces` pieces
    pub fn single(name: impl Into<String>, pieces: usize) -> Self {
        Self::new().with_device(name, pieces)
    }

    /// `count` devices named `{prefix}:{i}`, one piece each
    pub fn uniform(prefix: &str, count: usize) -> Self {
        (0..count).fold(Self::new(), |map, i| map.with_device(format!("{}:{}", prefix, i), 1))
    }

    /// Builder: add a device
    pub fn with_device(mut self, name: impl Into<String>, pieces: usize) -> Self {
        self.devices.push((name.into(), pieces));
        self
    }

    /// Number of distinct devices (worker slots)
    #[inline]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Total number of pieces over all devices
    pub fn num_pieces(&self) -> usize {
        self.devices.iter().map(|(_, n)| n).sum()
    }

    /// `(name, pieces)` in assignment order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.devices.iter().map(|(name, n)| (name.as_str(), *n))
    }

    /// Device name by slot
    pub fn name(&self, device: usize) -> Option<&str> {
        self.devices.get(device).map(|(name, _)| name.as_str())
    }

    /// Piece ids owned by each device
    pub fn piece_ranges(&self) -> Vec<(&str, Range<usize>)> {
        let mut start = 0;
        self.devices
            .iter()
            .map(|(name, n)| {
                let range = start..start + n;
                start += n;
                (name.as_str(), range)
            })
            .collect()
    }

    /// Validate the map and return the number of global qubits it implies
    pub fn num_global(&self) -> Result<usize> {
        if self.devices.is_empty() {
            return Err(DistributedError::InvalidConfig(
                "at least one calculation device is required".to_string(),
            ));
        }
        if let Some((name, _)) = self.devices.iter().find(|(_, n)| *n == 0) {
            return Err(DistributedError::InvalidConfig(format!(
                "device {} is assigned no pieces",
                name
            )));
        }
        let total = self.num_pieces();
        if !total.is_power_of_two() {
            return Err(DistributedError::InvalidDeviceCount { devices: total });
        }
        Ok(total.trailing_zeros() as usize)
    }
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self::single("cpu:0", 2)
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for DeviceMap {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().map(|(name, n)| (name.into(), n)).collect(),
        }
    }
}

/// Configuration for a distributed circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedConfig {
    /// Calculation devices and how many pieces each one holds
    ///
    /// The total piece count must be a power of two.
    ///
    /// Default: one device `cpu:0` with 2 pieces
    pub devices: DeviceMap,

    /// Device holding the full-state buffers used by split, merge and swap
    ///
    /// Default: "cpu:0"
    pub memory_device: String,

    /// Run device tasks of a round concurrently
    ///
    /// When false each device task runs to completion before the next one
    /// starts. Useful for debugging.
    ///
    /// Default: true
    pub parallel: bool,

    /// Check that execution preserved the norm of the initial state
    ///
    /// Default: enabled in debug builds
    pub validate_norm: bool,

    /// Tolerance for the norm check
    ///
    /// Default: 1e-8
    pub norm_tolerance: f64,

    /// Record per-round timings
    ///
    /// Default: true
    pub collect_telemetry: bool,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            devices: DeviceMap::default(),
            memory_device: "cpu:0".to_string(),
            parallel: true,
            validate_norm: cfg!(debug_assertions),
            norm_tolerance: 1e-8,
            collect_telemetry: true,
        }
    }
}

impl DistributedConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the given devices, defaults elsewhere
    pub fn with_devices(devices: DeviceMap) -> Self {
        Self {
            devices,
            ..Default::default()
        }
    }

    /// Configuration for debugging
    ///
    /// - Sequential device tasks
    /// - Norm validation
    /// - Telemetry collection
    pub fn debug(devices: DeviceMap) -> Self {
        Self {
            devices,
            parallel: false,
            validate_norm: true,
            collect_telemetry: true,
            ..Default::default()
        }
    }

    /// Builder: set the memory device
    pub fn with_memory_device(mut self, device: impl Into<String>) -> Self {
        self.memory_device = device.into();
        self
    }

    /// Builder: enable/disable concurrent device tasks
    pub fn with_parallel(mut self, enable: bool) -> Self {
        self.parallel = enable;
        self
    }

    /// Builder: enable/disable final norm validation
    pub fn with_norm_validation(mut self, enable: bool, tolerance: f64) -> Self {
        self.validate_norm = enable;
        self.norm_tolerance = tolerance;
        self
    }

    /// Builder: enable/disable telemetry
    pub fn with_telemetry(mut self, enable: bool) -> Self {
        self.collect_telemetry = enable;
        self
    }

    /// Number of pieces the state is split into
    pub fn num_pieces(&self) -> usize {
        self.devices.num_pieces()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.devices.num_global()?;

        if self.memory_device.is_empty() {
            return Err(DistributedError::InvalidConfig(
                "memory_device must not be empty".to_string(),
            ));
        }

        if !(self.norm_tolerance >= 0.0) {
            return Err(DistributedError::InvalidConfig(
                "norm_tolerance must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DistributedConfig::default();
        assert_eq!(config.num_pieces(), 2);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_config() {
        let config = DistributedConfig::debug(DeviceMap::uniform("gpu", 4));
        assert!(!config.parallel);
        assert!(config.validate_norm);
        assert_eq!(config.devices.len(), 4);
    }

    #[test]
    fn test_piece_ranges_are_contiguous() {
        let devices = DeviceMap::new().with_device("gpu:0", 2).with_device("gpu:1", 2);
        let ranges = devices.piece_ranges();
        assert_eq!(ranges[0], ("gpu:0", 0..2));
        assert_eq!(ranges[1], ("gpu:1", 2..4));
        assert_eq!(devices.num_global().unwrap(), 2);
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let devices: DeviceMap = vec![("gpu:0", 2), ("gpu:1", 1)].into_iter().collect();
        assert_eq!(
            devices.num_global(),
            Err(DistributedError::InvalidDeviceCount { devices: 3 })
        );
    }

    #[test]
    fn test_validation() {
        let config = DistributedConfig::with_devices(DeviceMap::new());
        assert!(config.validate().is_err());

        let config = DistributedConfig::with_devices(DeviceMap::single("cpu:0", 0));
        assert!(config.validate().is_err());

        let config = DistributedConfig::new().with_norm_validation(true, f64::NAN);
        assert!(config.validate().is_err());

        let config = DistributedConfig::new().with_memory_device("");
        assert!(config.validate().is_err());

        let config = DistributedConfig::with_devices(DeviceMap::single("cpu:0", 1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DistributedConfig::new()
            .with_parallel(false)
            .with_telemetry(false)
            .with_memory_device("host");

        assert!(!config.parallel);
        assert!(!config.collect_telemetry);
        assert_eq!(config.memory_device, "host");
    }
}
