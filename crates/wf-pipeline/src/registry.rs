//! Backend registry: maps each [`BackendKind`] to an implementation.

use std::collections::HashMap;
use std::sync::Arc;

use wf_codec::{Device, GpuCompute, LibWebpCodec, NativeCodec, SoftwareGpu, UnavailableGpu};
use wf_core::config::Config;
use wf_core::BackendKind;

use crate::backend::EncoderBackend;
use crate::backends::{
    BaselineBackend, CpuProgressiveBackend, CpuStandardBackend, GpuBackend, NativeCodecBackend,
};

/// External collaborators the built-in backends delegate to.
#[derive(Clone)]
pub struct Collaborators {
    pub gpu: Arc<dyn GpuCompute>,
    pub codec: Arc<dyn NativeCodec>,
}

impl Collaborators {
    pub fn new(gpu: Arc<dyn GpuCompute>, codec: Arc<dyn NativeCodec>) -> Self {
        Self { gpu, codec }
    }

    /// The CPU-emulated GPU adapter with libwebp.
    pub fn software() -> Self {
        Self::new(Arc::new(SoftwareGpu::default()), Arc::new(LibWebpCodec::new()))
    }
}

impl Default for Collaborators {
    /// No GPU, libwebp codec.
    fn default() -> Self {
        Self::new(Arc::new(UnavailableGpu), Arc::new(LibWebpCodec::new()))
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("gpu", &self.gpu.name())
            .field("codec", &self.codec.name())
            .finish()
    }
}

/// Lookup table of encoder backends.
///
/// A baseline backend is always present. Registering a backend replaces any
/// earlier one of the same kind.
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn EncoderBackend>>,
}

impl BackendRegistry {
    /// A registry holding only the baseline backend.
    pub fn new() -> Self {
        let mut registry = Self {
            backends: HashMap::new(),
        };
        registry.register(Arc::new(BaselineBackend::new()));
        registry
    }

    /// A registry with every built-in backend.
    ///
    /// `device` is the handle acquired by the capability probe; GPU backends
    /// report themselves unavailable without one.
    pub fn standard(collaborators: Collaborators, device: Option<Device>, config: &Config) -> Self {
        let Collaborators { gpu, codec } = collaborators;
        let ladder = config.progressive.clone();

        let mut registry = Self::new();
        registry.register(Arc::new(NativeCodecBackend::lossless(Arc::clone(&codec))));
        registry.register(Arc::new(NativeCodecBackend::optimized(Arc::clone(&codec))));
        registry.register(Arc::new(GpuBackend::hybrid(Arc::clone(&gpu), device.clone(), codec)));
        registry.register(Arc::new(GpuBackend::progressive(
            Arc::clone(&gpu),
            device.clone(),
            ladder.clone(),
        )));
        registry.register(Arc::new(GpuBackend::standard(gpu, device)));
        registry.register(Arc::new(CpuProgressiveBackend::new(ladder)));
        registry.register(Arc::new(CpuStandardBackend::new()));
        registry
    }

    /// Add or replace a backend.
    pub fn register(&mut self, backend: Arc<dyn EncoderBackend>) -> &mut Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn EncoderBackend>> {
        self.backends.get(&kind).cloned()
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Registered kinds in priority order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.backends.contains_key(kind))
            .collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
