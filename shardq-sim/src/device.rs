//! Calculation devices and the worker pool that drives them
//!
//! Each device gets exactly one worker slot. A round hands every device one
//! job; [`DeviceBackend::join_all`] returns only after all of them finished.

use crate::config::DeviceMap;
use crate::error::{DistributedError, Result};
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

/// Work for one device in one round
pub type DeviceJob<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

/// Backend that runs per-device jobs
pub trait DeviceBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Devices and their piece counts
    fn devices(&self) -> &DeviceMap;

    /// Number of worker slots
    fn device_count(&self) -> usize {
        self.devices().len()
    }

    /// Run one job on `device` and wait for it
    fn run_on_device<'a>(&self, device: usize, job: DeviceJob<'a>) -> Result<()>;

    /// Run one job per device concurrently and wait for all of them
    ///
    /// `jobs[i]` belongs to device `i`. Results come back in the same order.
    fn join_all<'a>(&self, jobs: Vec<DeviceJob<'a>>) -> Vec<Result<()>>;
}

/// Rayon pool with one thread per device
pub struct ThreadPoolBackend {
    devices: DeviceMap,
    pool: Option<ThreadPool>,
}

impl ThreadPoolBackend {
    /// Create a backend for `devices`
    ///
    /// Falls back to the global rayon pool if a dedicated pool cannot be built.
    pub fn new(devices: DeviceMap) -> Self {
        let threads = devices.len().max(1);
        let pool = match ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("shardq-device-{}", i))
            .build()
        {
            Ok(pool) => {
                debug!(threads, "device pool ready");
                Some(pool)
            }
            Err(err) => {
                warn!(threads, error = %err, "device pool unavailable, using global rayon pool");
                None
            }
        };
        Self { devices, pool }
    }

    fn device_name(&self, device: usize) -> Result<&str> {
        self.devices.name(device).ok_or_else(|| {
            DistributedError::InvalidConfig(format!(
                "device slot {} out of range for {} devices",
                device,
                self.devices.len()
            ))
        })
    }
}

impl DeviceBackend for ThreadPoolBackend {
    fn name(&self) -> &str {
        "rayon-thread-pool"
    }

    fn devices(&self) -> &DeviceMap {
        &self.devices
    }

    fn run_on_device<'a>(&self, device: usize, job: DeviceJob<'a>) -> Result<()> {
        self.device_name(device)?;
        match &self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }

    fn join_all<'a>(&self, jobs: Vec<DeviceJob<'a>>) -> Vec<Result<()>> {
        let mut slots: Vec<Option<Result<()>>> = (0..jobs.len()).map(|_| None).collect();
        match &self.pool {
            Some(pool) => pool.scope(|s| spawn_all(s, jobs, &mut slots)),
            None => rayon::scope(|s| spawn_all(s, jobs, &mut slots)),
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(device, slot)| {
                slot.unwrap_or_else(|| {
                    Err(DistributedError::DeviceTask {
                        device: self.devices.name(device).unwrap_or("unknown").to_string(),
                        piece: 0,
                        gate: String::new(),
                        reason: "task did not report a result".to_string(),
                    })
                })
            })
            .collect()
    }
}

fn spawn_all<'scope>(
    scope: &Scope<'scope>,
    jobs: Vec<DeviceJob<'scope>>,
    slots: &'scope mut [Option<Result<()>>],
) {
    for (slot, job) in slots.iter_mut().zip(jobs) {
        scope.spawn(move |_| *slot = Some(job()));
    }
}

impl std::fmt::Debug for ThreadPoolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolBackend")
            .field("devices", &self.devices)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_one_thread_per_device() {
        let backend = ThreadPoolBackend::new(DeviceMap::uniform("cpu", 3));
        assert_eq!(backend.device_count(), 3);
        if let Some(pool) = &backend.pool {
            assert_eq!(pool.current_num_threads(), 3);
        }
    }

    #[test]
    fn test_join_all_runs_every_job() {
        let backend = ThreadPoolBackend::new(DeviceMap::uniform("cpu", 4));
        let counter = AtomicUsize::new(0);
        let jobs: Vec<DeviceJob<'_>> = (0..4)
            .map(|_| {
                let counter = &counter;
                Box::new(move || -> Result<()> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }) as DeviceJob<'_>
            })
            .collect();

        let results = backend.join_all(jobs);
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_join_all_keeps_device_order() {
        let backend = ThreadPoolBackend::new(DeviceMap::uniform("cpu", 2));
        let jobs: Vec<DeviceJob<'_>> = vec![
            Box::new(|| -> Result<()> { Ok(()) }),
            Box::new(|| -> Result<()> { Err(DistributedError::InvalidConfig("second".into())) }),
        ];
        let results = backend.join_all(jobs);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(DistributedError::InvalidConfig("second".into()))
        );
    }

    #[test]
    fn test_jobs_mutate_disjoint_slices() {
        let backend = ThreadPoolBackend::new(DeviceMap::uniform("cpu", 2));
        let mut data = vec![0u32; 4];
        {
            let (left, right) = data.split_at_mut(2);
            let jobs: Vec<DeviceJob<'_>> = vec![
                Box::new(move || -> Result<()> {
                    left.iter_mut().for_each(|v| *v = 1);
                    Ok(())
                }),
                Box::new(move || -> Result<()> {
                    right.iter_mut().for_each(|v| *v = 2);
                    Ok(())
                }),
            ];
            backend.join_all(jobs);
        }
        assert_eq!(data, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_run_on_device() {
        let backend = ThreadPoolBackend::new(DeviceMap::uniform("cpu", 2));
        let mut hit = false;
        backend
            .run_on_device(1, Box::new(|| -> Result<()> {
                hit = true;
                Ok(())
            }))
            .unwrap();
        assert!(hit);
        assert!(backend.run_on_device(2, Box::new(|| -> Result<()> { Ok(()) })).is_err());
    }
}
