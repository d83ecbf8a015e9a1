//! GPU compute collaborator.
//!
//! A [`Device`] is an explicit handle obtained from
//! [`GpuCompute::try_acquire_device`] and passed to every operation. The
//! device is a process-wide shared resource: the collaborator serializes
//! access internally, and callers must be ready for it to become unusable
//! (lost, or under memory pressure) at any time after acquisition.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rayon::prelude::*;
use wf_core::{Error, ImageBuffer, Result};

use crate::ops;

/// Opaque device identifier, unique per collaborator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu#{}", self.0)
    }
}

/// Handle to an acquired compute device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub label: String,
    /// Memory the device is willing to dedicate to one operation.
    pub memory_budget_bytes: u64,
}

/// Hints for device acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePreferences {
    pub high_performance: bool,
    /// Devices with less memory than this are not acquired.
    pub min_memory_bytes: u64,
}

impl Default for DevicePreferences {
    fn default() -> Self {
        Self {
            high_performance: true,
            min_memory_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Health of a device at the time of asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Ready,
    Lost,
    MemoryPressure,
}

/// Image operations a compute device can run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageOp {
    Resize { width: u32, height: u32 },
    Sharpen { sigma: f32, threshold: i32 },
    /// Keep `bits` significant bits per color channel.
    Quantize { bits: u8 },
}

impl ImageOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::Sharpen { .. } => "sharpen",
            Self::Quantize { .. } => "quantize",
        }
    }
}

/// A GPU compute collaborator.
#[async_trait]
pub trait GpuCompute: Send + Sync {
    /// Human-readable adapter name.
    fn name(&self) -> &'static str;

    /// Acquire a device, or `None` if no suitable device exists.
    ///
    /// Must not fail or panic on resource exhaustion; `None` is the answer.
    async fn try_acquire_device(&self, prefs: &DevicePreferences) -> Option<Device>;

    /// Current health of a previously acquired device.
    fn device_status(&self, device: &Device) -> DeviceStatus;

    /// Give a device back. The handle must not be used afterwards.
    fn release_device(&self, _device: &Device) {}

    /// Run one operation, consuming the input buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] when the device cannot accept
    /// work.
    async fn run_image_op(
        &self,
        device: &Device,
        image: ImageBuffer,
        op: ImageOp,
    ) -> Result<ImageBuffer>;
}

// ---------------------------------------------------------------------------
// UnavailableGpu
// ---------------------------------------------------------------------------

/// Collaborator for environments with no GPU at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGpu;

#[async_trait]
impl GpuCompute for UnavailableGpu {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn try_acquire_device(&self, _prefs: &DevicePreferences) -> Option<Device> {
        None
    }

    fn device_status(&self, _device: &Device) -> DeviceStatus {
        DeviceStatus::Lost
    }

    async fn run_image_op(
        &self,
        device: &Device,
        _image: ImageBuffer,
        _op: ImageOp,
    ) -> Result<ImageBuffer> {
        Err(Error::unavailable(device.id, "no GPU in this environment"))
    }
}

// ---------------------------------------------------------------------------
// SoftwareGpu
// ---------------------------------------------------------------------------

/// Software compute adapter: runs device operations on the rayon pool.
///
/// Useful for headless hosts and tests. Acquisition hands out the existing
/// healthy device when there is one, so repeated probes share a handle.
/// Device health can be changed from the outside to model loss and memory
/// pressure caused by other users of the device.
pub struct SoftwareGpu {
    memory_budget_bytes: u64,
    next_id: AtomicU64,
    status: Mutex<HashMap<DeviceId, DeviceStatus>>,
}

impl SoftwareGpu {
    /// Create an adapter offering devices with the given memory budget.
    pub fn new(memory_budget_bytes: u64) -> Self {
        Self {
            memory_budget_bytes,
            next_id: AtomicU64::new(1),
            status: Mutex::new(HashMap::new()),
        }
    }

    /// Mark a device as lost.
    pub fn mark_lost(&self, device: &Device) {
        self.status.lock().insert(device.id, DeviceStatus::Lost);
    }

    /// Toggle memory pressure on a device.
    pub fn set_memory_pressure(&self, device: &Device, under_pressure: bool) {
        let status = if under_pressure {
            DeviceStatus::MemoryPressure
        } else {
            DeviceStatus::Ready
        };
        self.status.lock().insert(device.id, status);
    }

    /// Number of acquired devices not yet released.
    pub fn live_devices(&self) -> usize {
        self.status.lock().len()
    }

    fn device(&self, id: DeviceId) -> Device {
        Device {
            id,
            label: format!("software adapter {id}"),
            memory_budget_bytes: self.memory_budget_bytes,
        }
    }
}

impl Default for SoftwareGpu {
    fn default() -> Self {
        Self::new(512 * 1024 * 1024)
    }
}

impl fmt::Debug for SoftwareGpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareGpu")
            .field("memory_budget_bytes", &self.memory_budget_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GpuCompute for SoftwareGpu {
    fn name(&self) -> &'static str {
        "software"
    }

    async fn try_acquire_device(&self, prefs: &DevicePreferences) -> Option<Device> {
        if self.memory_budget_bytes < prefs.min_memory_bytes {
            return None;
        }
        let mut status = self.status.lock();
        let healthy = status
            .iter()
            .filter(|(_, s)| **s == DeviceStatus::Ready)
            .map(|(id, _)| *id)
            .min_by_key(|id| id.0);
        let id = match healthy {
            Some(id) => id,
            None => {
                // Lost devices never recover; forget them once replaced.
                status.retain(|_, s| *s != DeviceStatus::Lost);
                let id = DeviceId(self.next_id.fetch_add(1, Ordering::Relaxed));
                status.insert(id, DeviceStatus::Ready);
                id
            }
        };
        Some(self.device(id))
    }

    fn device_status(&self, device: &Device) -> DeviceStatus {
        self.status
            .lock()
            .get(&device.id)
            .copied()
            .unwrap_or(DeviceStatus::Lost)
    }

    fn release_device(&self, device: &Device) {
        self.status.lock().remove(&device.id);
    }

    async fn run_image_op(
        &self,
        device: &Device,
        image: ImageBuffer,
        op: ImageOp,
    ) -> Result<ImageBuffer> {
        match self.device_status(device) {
            DeviceStatus::Ready => {}
            DeviceStatus::Lost => return Err(Error::unavailable(device.id, "device lost")),
            DeviceStatus::MemoryPressure => {
                return Err(Error::unavailable(device.id, "device under memory pressure"))
            }
        }

        let result = tokio::task::spawn_blocking(move || run_op(image, op))
            .await
            .map_err(|e| Error::Internal(format!("software device task failed: {e}")))?;
        let out = result?;
        out.validate()?;
        Ok(out)
    }
}

fn run_op(image: ImageBuffer, op: ImageOp) -> Result<ImageBuffer> {
    match op {
        ImageOp::Resize { width, height } => ops::resize(image, width, height),
        ImageOp::Sharpen { sigma, threshold } => ops::sharpen(image, sigma, threshold),
        ImageOp::Quantize { bits } => {
            let mut image = image;
            image
                .pixels_mut()
                .par_chunks_mut(4 * 1024)
                .for_each(|chunk| ops::quantize_in_place(chunk, bits));
            Ok(image)
        }
    }
}
