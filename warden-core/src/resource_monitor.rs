//! Advisory host and per-process resource sampling.
//!
//! Nothing here ever blocks a command because a metric could not be read:
//! a missing process, an unreadable `/proc` entry or an unknown disk all
//! count as "within limits".

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::{Disks, Pid, System};
use tracing::{debug, trace};
use warden_bash_runner::{ProcessWatchdog, WatchVerdict};
use warden_config::constants::resources::{
    CPU_BREACH_GRACE_SECS, SYSTEM_CPU_WARN_PERCENT, SYSTEM_DISK_WARN_PERCENT, SYSTEM_MEMORY_WARN_PERCENT,
};
use warden_config::ResourceLimits;

/// Verdict for a supervised process.
pub type ProcessVerdict = WatchVerdict;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Point-in-time resource usage of a process and its descendants.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub memory_mb: f64,
    pub cpu_percent: f32,
    /// Processes below the sampled one, at any depth.
    pub descendants: usize,
    /// `None` where descriptor counts are not observable.
    pub open_files: Option<usize>,
    /// Seconds since the epoch; tells a reused PID apart from its predecessor.
    pub started_at: u64,
}

/// When each supervised process first went over its CPU limit.
#[derive(Debug, Default)]
struct CpuBreaches {
    since: HashMap<u32, (u64, Instant)>,
}

impl CpuBreaches {
    /// How long `pid` has been over the limit, or `None` if it is not.
    fn observe(&mut self, pid: u32, started_at: u64, over: bool, now: Instant) -> Option<Duration> {
        if !over {
            self.since.remove(&pid);
            return None;
        }
        let entry = self.since.entry(pid).or_insert((started_at, now));
        if entry.0 != started_at {
            *entry = (started_at, now);
        }
        Some(now.saturating_duration_since(entry.1))
    }

    fn retain(&mut self, mut alive: impl FnMut(u32) -> bool) {
        self.since.retain(|pid, _| alive(*pid));
    }
}

#[derive(Debug)]
pub struct ResourceMonitor {
    limits: ResourceLimits,
    system: Mutex<System>,
    cpu_breaches: Mutex<CpuBreaches>,
    cpu_grace: Duration,
}

impl ResourceMonitor {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            system: Mutex::new(System::new()),
            cpu_breaches: Mutex::new(CpuBreaches::default()),
            cpu_grace: Duration::from_secs(CPU_BREACH_GRACE_SECS),
        }
    }

    /// Override how long a CPU limit breach is tolerated.
    pub fn with_cpu_grace(mut self, grace: Duration) -> Self {
        self.cpu_grace = grace;
        self
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// A warning when the host itself is under pressure.
    pub fn check_system_resources(&self) -> Option<String> {
        let (memory_percent, cpu_percent) = {
            let mut system = self.system.lock();
            system.refresh_memory();
            system.refresh_cpu();
            let total = system.total_memory();
            let memory_percent = (total > 0).then(|| percent(system.used_memory(), total));
            (memory_percent, system.global_cpu_info().cpu_usage())
        };

        if let Some(memory_percent) = memory_percent {
            if memory_percent > SYSTEM_MEMORY_WARN_PERCENT {
                return Some(format!("System memory usage too high: {memory_percent:.1}%"));
            }
        }

        if cpu_percent > SYSTEM_CPU_WARN_PERCENT {
            return Some(format!("System CPU usage too high: {cpu_percent:.1}%"));
        }

        if let Some(disk_percent) = root_disk_usage() {
            if disk_percent > SYSTEM_DISK_WARN_PERCENT {
                return Some(format!("System disk usage too high: {disk_percent:.1}%"));
            }
        }

        None
    }

    /// Sample `pid`. `None` when the process cannot be observed.
    pub fn sample_process(&self, pid: u32) -> Option<ProcessSample> {
        let target = Pid::from_u32(pid);
        let mut system = self.system.lock();
        system.refresh_processes();
        self.cpu_breaches
            .lock()
            .retain(|tracked| system.process(Pid::from_u32(tracked)).is_some());

        let process = system.process(target)?;
        let memory_mb = bytes_to_mb(process.memory());
        let cpu_percent = process.cpu_usage();
        let descendants = count_descendants(&system, target);

        Some(ProcessSample {
            memory_mb,
            cpu_percent,
            descendants,
            open_files: open_file_count(pid),
            started_at: process.start_time(),
        })
    }

    /// Compare a fresh sample of `pid` against the configured limits.
    pub fn evaluate(&self, pid: u32) -> ProcessVerdict {
        let Some(sample) = self.sample_process(pid) else {
            trace!(pid, "Process not observable; continuing");
            return ProcessVerdict::Continue;
        };
        trace!(pid, ?sample, "Sampled process");

        let limits = &self.limits;
        let cpu_breach = self.cpu_breaches.lock().observe(
            pid,
            sample.started_at,
            sample.cpu_percent > limits.max_cpu_percent,
            Instant::now(),
        );

        #[allow(clippy::cast_precision_loss)]
        let max_memory_mb = limits.max_memory_mb as f64;
        if sample.memory_mb > max_memory_mb {
            return ProcessVerdict::Terminate(format!(
                "Process exceeded memory limit: {:.1} MB > {} MB",
                sample.memory_mb, limits.max_memory_mb
            ));
        }

        if let Some(sustained) = cpu_breach {
            if sustained >= self.cpu_grace {
                return ProcessVerdict::Terminate(format!(
                    "Process exceeded CPU limit: {:.1}% > {}% for {}s",
                    sample.cpu_percent,
                    limits.max_cpu_percent,
                    sustained.as_secs()
                ));
            }
        }

        if sample.descendants > limits.max_processes {
            return ProcessVerdict::Terminate(format!(
                "Process exceeded process limit: {} > {}",
                sample.descendants, limits.max_processes
            ));
        }

        if let Some(open_files) = sample.open_files {
            if open_files > limits.max_open_files {
                return ProcessVerdict::Terminate(format!(
                    "Process exceeded open files limit: {open_files} > {}",
                    limits.max_open_files
                ));
            }
        }

        ProcessVerdict::Continue
    }
}

impl ProcessWatchdog for ResourceMonitor {
    fn inspect(&self, pid: u32) -> WatchVerdict {
        let verdict = self.evaluate(pid);
        if let WatchVerdict::Terminate(reason) = &verdict {
            debug!(pid, %reason, "Resource limit breached");
        }
        verdict
    }
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn percent(used: u64, total: u64) -> f32 {
    (used as f64 / total as f64 * 100.0) as f32
}

fn count_descendants(system: &System, root: Pid) -> usize {
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, process) in system.processes() {
        if let Some(parent) = process.parent() {
            children.entry(parent).or_default().push(*pid);
        }
    }

    let mut count = 0;
    let mut pending = vec![root];
    while let Some(pid) = pending.pop() {
        if let Some(kids) = children.get(&pid) {
            count += kids.len();
            pending.extend(kids.iter().copied());
        }
    }
    count
}

#[cfg(target_os = "linux")]
fn open_file_count(pid: u32) -> Option<usize> {
    std::fs::read_dir(format!("/proc/{pid}/fd"))
        .ok()
        .map(|entries| entries.count())
}

#[cfg(not(target_os = "linux"))]
fn open_file_count(_pid: u32) -> Option<usize> {
    None
}

/// Used percentage of the disk mounted at `/`, if one is listed.
fn root_disk_usage() -> Option<f32> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))?;

    let total = disk.total_space();
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(disk.available_space());
    Some(percent(used, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_PID: u32 = 2_000_000_000;

    #[test]
    fn missing_process_fails_open() {
        let monitor = ResourceMonitor::new(ResourceLimits::default());
        assert!(monitor.sample_process(MISSING_PID).is_none());
        assert_eq!(monitor.evaluate(MISSING_PID), ProcessVerdict::Continue);
        assert_eq!(monitor.inspect(MISSING_PID), WatchVerdict::Continue);
    }

    #[test]
    fn samples_the_current_process() {
        let monitor = ResourceMonitor::new(ResourceLimits::default());
        let sample = monitor.sample_process(std::process::id()).unwrap();
        assert!(sample.memory_mb > 0.0);
    }

    #[test]
    fn memory_limit_breach_terminates() {
        let limits = ResourceLimits {
            max_memory_mb: 0,
            ..ResourceLimits::default()
        };
        let monitor = ResourceMonitor::new(limits);

        match monitor.evaluate(std::process::id()) {
            ProcessVerdict::Terminate(reason) => {
                assert!(reason.starts_with("Process exceeded memory limit:"));
            }
            ProcessVerdict::Continue => panic!("expected a memory limit breach"),
        }
    }

    #[test]
    fn host_check_never_panics() {
        let monitor = ResourceMonitor::new(ResourceLimits::default());
        if let Some(warning) = monitor.check_system_resources() {
            assert!(warning.starts_with("System "));
        }
    }

    #[test]
    fn cpu_breach_must_be_sustained() {
        let mut breaches = CpuBreaches::default();
        let start = Instant::now();
        let later = start + Duration::from_secs(5);

        assert_eq!(breaches.observe(7, 100, true, start), Some(Duration::ZERO));
        assert_eq!(breaches.observe(7, 100, true, later), Some(Duration::from_secs(5)));

        // Dropping below the limit resets the window.
        assert_eq!(breaches.observe(7, 100, false, later), None);
        assert_eq!(breaches.observe(7, 100, true, later), Some(Duration::ZERO));

        // A reused PID starts a fresh window.
        let reused = later + Duration::from_secs(3);
        assert_eq!(breaches.observe(7, 200, true, reused), Some(Duration::ZERO));

        breaches.retain(|pid| pid != 7);
        assert!(breaches.since.is_empty());
    }

    #[test]
    fn short_cpu_spikes_are_tolerated() {
        let limits = ResourceLimits {
            max_cpu_percent: 0.001,
            max_processes: usize::MAX,
            max_open_files: usize::MAX,
            ..ResourceLimits::default()
        };
        let monitor = ResourceMonitor::new(limits);
        let busy = std::thread::spawn(|| {
            let deadline = Instant::now() + Duration::from_millis(300);
            let mut spins = 0_u64;
            while Instant::now() < deadline {
                spins = spins.wrapping_add(1);
            }
            spins
        });

        for _ in 0..3 {
            assert_eq!(monitor.evaluate(std::process::id()), ProcessVerdict::Continue);
            std::thread::sleep(Duration::from_millis(100));
        }
        busy.join().unwrap();
    }

    #[test]
    fn sustained_cpu_breach_terminates() {
        let limits = ResourceLimits {
            max_cpu_percent: 0.001,
            ..ResourceLimits::default()
        };
        let monitor = ResourceMonitor::new(limits).with_cpu_grace(Duration::ZERO);
        let busy = std::thread::spawn(|| {
            let deadline = Instant::now() + Duration::from_millis(1_500);
            let mut spins = 0_u64;
            while Instant::now() < deadline {
                spins = spins.wrapping_add(1);
            }
            spins
        });

        let mut verdict = ProcessVerdict::Continue;
        for _ in 0..5 {
            verdict = monitor.evaluate(std::process::id());
            if verdict != ProcessVerdict::Continue {
                break;
            }
            std::thread::sleep(Duration::from_millis(250));
        }
        busy.join().unwrap();

        match verdict {
            ProcessVerdict::Terminate(reason) => {
                assert!(reason.starts_with("Process exceeded CPU limit:"), "{reason}");
            }
            ProcessVerdict::Continue => panic!("expected a CPU limit breach"),
        }
    }

    #[test]
    fn percent_math() {
        assert!((percent(50, 200) - 25.0).abs() < f32::EPSILON);
    }
}
