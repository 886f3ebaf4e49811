use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    Active,
    Background,
}

/// Feed of app foreground/background transitions. Platform glue emits into
/// it; the memory manager subscribes. Injected so tests can drive phases
/// deterministically without a real platform runtime.
pub trait AppLifecycleSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<AppPhase>;
}

/// Channel-backed lifecycle source. The host calls `emit` from its platform
/// event handler.
pub struct ChannelLifecycleSource {
    sender: broadcast::Sender<AppPhase>,
}

impl ChannelLifecycleSource {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn emit(&self, phase: AppPhase) {
        // No receivers yet is fine; transitions before start() are dropped.
        let _ = self.sender.send(phase);
    }
}

impl Default for ChannelLifecycleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppLifecycleSource for ChannelLifecycleSource {
    fn subscribe(&self) -> broadcast::Receiver<AppPhase> {
        self.sender.subscribe()
    }
}

/// Measured memory usage of the process, as a 0.0..=1.0 ratio of whatever
/// limit the platform enforces.
pub trait MemoryProbe: Send + Sync {
    fn usage_ratio(&self) -> f64;
}

/// Probe that always reports no pressure. For tests and hosts without a
/// native measurement.
pub struct NoopMemoryProbe;

impl MemoryProbe for NoopMemoryProbe {
    fn usage_ratio(&self) -> f64 {
        0.0
    }
}
