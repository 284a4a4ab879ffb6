//! Device contexts: per-place execution queues.
//!
//! Provides a lazily-populated singleton pool with one context per place and
//! the thread-local active device used by CUDA places.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use kore_core::Device;
use parking_lot::Mutex;

use crate::Result;

/// Execution resources bound to one place.
pub trait DeviceContext: Send + Sync {
    fn place(&self) -> Device;

    /// Block until all work enqueued on this context has finished.
    fn wait(&self);

    /// Concrete context, for kernels that need backend-specific handles.
    fn as_any(&self) -> &dyn Any;
}

/// Host context. Work runs synchronously, so `wait` returns immediately.
///
/// Also serves pinned host memory, which the host reads directly.
#[derive(Debug)]
pub struct CpuDeviceContext {
    place: Device,
    waits: AtomicUsize,
}

impl CpuDeviceContext {
    pub fn new() -> Self {
        Self::on(Device::Cpu)
    }

    pub fn pinned() -> Self {
        Self::on(Device::CudaPinned)
    }

    fn on(place: Device) -> Self {
        Self {
            place,
            waits: AtomicUsize::new(0),
        }
    }

    /// Number of `wait` calls so far.
    pub fn wait_count(&self) -> usize {
        self.waits.load(Ordering::Relaxed)
    }
}

impl Default for CpuDeviceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceContext for CpuDeviceContext {
    fn place(&self) -> Device {
        self.place
    }

    fn wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Context for one CUDA device, tracking work enqueued on its stream.
#[cfg(feature = "cuda")]
#[derive(Debug)]
pub struct CudaDeviceContext {
    device_id: usize,
    pending: AtomicUsize,
}

#[cfg(feature = "cuda")]
impl CudaDeviceContext {
    pub fn new(device_id: usize) -> Self {
        Self {
            device_id,
            pending: AtomicUsize::new(0),
        }
    }

    /// Record one unit of asynchronous work.
    pub fn enqueue(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "cuda")]
impl DeviceContext for CudaDeviceContext {
    fn place(&self) -> Device {
        Device::Cuda(self.device_id)
    }

    fn wait(&self) {
        let drained = self.pending.swap(0, Ordering::SeqCst);
        tracing::trace!("cuda:{} synchronized {} pending ops", self.device_id, drained);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Pool
// =============================================================================

/// Process-wide table of device contexts, one per place.
pub struct DeviceContextPool {
    contexts: Mutex<HashMap<Device, Arc<dyn DeviceContext>>>,
}

static POOL: OnceLock<DeviceContextPool> = OnceLock::new();

impl DeviceContextPool {
    pub fn instance() -> &'static DeviceContextPool {
        POOL.get_or_init(|| DeviceContextPool {
            contexts: Mutex::new(HashMap::new()),
        })
    }

    /// Get or create the context for `place`.
    ///
    /// CUDA places fail with `UnsupportedPlace` unless built with `cuda`.
    pub fn get(&self, place: Device) -> Result<Arc<dyn DeviceContext>> {
        let mut map = self.contexts.lock();
        if let Some(ctx) = map.get(&place) {
            return Ok(Arc::clone(ctx));
        }
        let ctx = create_context(place)?;
        map.insert(place, Arc::clone(&ctx));
        Ok(ctx)
    }

    /// Number of contexts created so far.
    pub fn len(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn create_context(place: Device) -> Result<Arc<dyn DeviceContext>> {
    match place {
        Device::Cpu => Ok(Arc::new(CpuDeviceContext::new())),
        Device::CudaPinned => Ok(Arc::new(CpuDeviceContext::pinned())),
        #[cfg(feature = "cuda")]
        Device::Cuda(idx) => Ok(Arc::new(CudaDeviceContext::new(idx))),
        #[cfg(not(feature = "cuda"))]
        Device::Cuda(_) => Err(crate::error::FrameworkError::UnsupportedPlace(place)),
    }
}

// =============================================================================
// Active device
// =============================================================================

thread_local! {
    static CURRENT_DEVICE: Cell<usize> = const { Cell::new(0) };
}

/// Bind the CUDA device used by subsequent work on this thread.
pub fn set_device_id(id: usize) {
    CURRENT_DEVICE.with(|d| d.set(id));
}

pub fn current_device_id() -> usize {
    CURRENT_DEVICE.with(|d| d.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_returns_same_context() {
        let pool = DeviceContextPool::instance();
        let a = pool.get(Device::Cpu).unwrap();
        let b = pool.get(Device::Cpu).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.place(), Device::Cpu);
        a.wait();
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_cpu_context_counts_waits() {
        let ctx = CpuDeviceContext::new();
        ctx.wait();
        ctx.wait();
        assert_eq!(ctx.wait_count(), 2);
        let any = ctx.as_any();
        assert!(any.downcast_ref::<CpuDeviceContext>().is_some());
    }

    #[test]
    fn test_pinned_context() {
        let ctx = DeviceContextPool::instance().get(Device::CudaPinned).unwrap();
        assert_eq!(ctx.place(), Device::CudaPinned);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_unsupported_without_feature() {
        use crate::error::FrameworkError;

        let err = DeviceContextPool::instance().get(Device::Cuda(0)).err().unwrap();
        assert!(matches!(err, FrameworkError::UnsupportedPlace(Device::Cuda(0))));
    }

    #[cfg(feature = "cuda")]
    #[test]
    fn test_cuda_context_drains_on_wait() {
        let ctx = CudaDeviceContext::new(1);
        ctx.enqueue();
        ctx.enqueue();
        assert_eq!(ctx.pending(), 2);
        ctx.wait();
        assert_eq!(ctx.pending(), 0);
        assert_eq!(ctx.place(), Device::Cuda(1));
    }

    #[test]
    fn test_device_id_is_thread_local() {
        set_device_id(3);
        assert_eq!(current_device_id(), 3);
        std::thread::spawn(|| assert_eq!(current_device_id(), 0))
            .join()
            .unwrap();
        set_device_id(0);
    }
}
