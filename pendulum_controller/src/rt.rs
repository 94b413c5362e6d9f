//! Process real-time tuning: memory locking, CPU affinity and `SCHED_FIFO`.
//!
//! The syscalls are compiled only with the `rt` feature. Without it every
//! step is a logged no-op so the controller runs unprivileged.

pub use pendulum_common::config::ProcessSettings;
use thiserror::Error;
use tracing::info;

/// Real-time setup failure. Fatal at startup.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("memory lock failed: {0}")]
    MemoryLock(String),
    #[error("CPU affinity failed: {0}")]
    Affinity(String),
    #[error("scheduler setup failed: {0}")]
    Scheduler(String),
}

/// CPU indices set in an affinity bitmask, lowest first.
pub fn cpus_in_mask(mask: u16) -> impl Iterator<Item = usize> {
    (0..u16::BITS as usize).filter(move |cpu| mask & (1 << cpu) != 0)
}

/// Apply priority and affinity to the calling thread.
///
/// Called from the process main thread before any spawn when
/// `configure_child_threads` is set, otherwise from the RT thread itself.
/// A zero priority or zero mask leaves that setting untouched.
pub fn apply_thread_settings(settings: &ProcessSettings) -> Result<(), RtError> {
    if settings.cpu_affinity != 0 {
        set_affinity(settings.cpu_affinity)?;
        info!("CPU affinity set to mask {:#06x}", settings.cpu_affinity);
    }
    if settings.process_priority != 0 {
        set_fifo_priority(i32::from(settings.process_priority))?;
        info!("SCHED_FIFO priority set to {}", settings.process_priority);
    }
    Ok(())
}

/// Lock memory and pre-fault `lock_memory_size_mb` of heap.
pub fn apply_memory_settings(settings: &ProcessSettings) -> Result<(), RtError> {
    if !settings.lock_memory {
        return Ok(());
    }
    lock_all_memory()?;
    prefault_heap(usize::from(settings.lock_memory_size_mb) * 1024 * 1024);
    info!(
        "Memory locked ({} MiB heap pre-faulted)",
        settings.lock_memory_size_mb
    );
    Ok(())
}

/// Fault in `bytes` of heap and keep them mapped after release.
///
/// The allocator is first told never to serve allocations with `mmap` and
/// never to trim the heap top, so the freed block stays resident and later
/// allocations reuse it without page faults.
pub fn prefault_heap(bytes: usize) {
    const PAGE: usize = 4096;
    if bytes == 0 {
        return;
    }
    retain_heap_pages();
    let mut block = vec![0u8; bytes];
    for offset in (0..bytes).step_by(PAGE) {
        // SAFETY: `offset < bytes == block.len()`.
        unsafe { core::ptr::write_volatile(block.as_mut_ptr().add(offset), 0xFF) };
    }
    core::hint::black_box(&block);
}

/// Pre-fault the calling thread's stack. Call once on the RT thread.
pub fn prefault_stack() {
    let mut buf = [0u8; STACK_PREFAULT_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Stack touched by [`prefault_stack`]; well below the default 2 MiB
/// thread stack.
const STACK_PREFAULT_BYTES: usize = 256 * 1024;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn retain_heap_pages() {
    // SAFETY: mallopt only adjusts allocator tunables.
    let no_mmap = unsafe { libc::mallopt(libc::M_MMAP_MAX, 0) };
    // SAFETY: as above.
    let no_trim = unsafe { libc::mallopt(libc::M_TRIM_THRESHOLD, -1) };
    if no_mmap == 0 || no_trim == 0 {
        tracing::warn!("mallopt rejected; pre-faulted heap may be returned to the OS");
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn retain_heap_pages() {
    tracing::debug!("mallopt unavailable; heap pre-fault is best effort");
}

#[cfg(feature = "rt")]
fn lock_all_memory() -> Result<(), RtError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| RtError::MemoryLock(format!("mlockall: {e}")))
}

#[cfg(not(feature = "rt"))]
fn lock_all_memory() -> Result<(), RtError> {
    tracing::debug!("mlockall skipped (rt feature disabled)");
    Ok(())
}

#[cfg(feature = "rt")]
fn set_affinity(mask: u16) -> Result<(), RtError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    for cpu in cpus_in_mask(mask) {
        cpuset
            .set(cpu)
            .map_err(|e| RtError::Affinity(format!("CpuSet::set({cpu}): {e}")))?;
    }
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| RtError::Affinity(format!("sched_setaffinity: {e}")))
}

#[cfg(not(feature = "rt"))]
fn set_affinity(mask: u16) -> Result<(), RtError> {
    tracing::debug!(
        "sched_setaffinity({:?}) skipped (rt feature disabled)",
        cpus_in_mask(mask).collect::<Vec<_>>()
    );
    Ok(())
}

#[cfg(feature = "rt")]
fn set_fifo_priority(priority: i32) -> Result<(), RtError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` is a valid, initialized sched_param for the call.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(RtError::Scheduler(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}): {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn set_fifo_priority(priority: i32) -> Result<(), RtError> {
    tracing::debug!("SCHED_FIFO({priority}) skipped (rt feature disabled)");
    Ok(())
}
