//! Output collaborator seams.
//!
//! Rendering and on-disk checkpoint formats are external to the engine; it
//! only consumes these traits. The implementations here are the trivial
//! ones the binary and the tests need — a real viewer or storage backend
//! plugs in behind the same seams.

use crate::simulation::states::{Tracer, Vortex};

/// One saved population frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub step: u64,
    pub seed: u64,
    pub vortices: Vec<Vortex>,
    pub tracers: Vec<Tracer>,
}

/// Receives a visual frame every Nth timestep.
pub trait FrameSink: Send {
    fn frame(&mut self, step: u64, vortices: &[Vortex], tracers: &[Tracer]);
}

/// Appends population snapshots to persistent storage and restores them.
pub trait SnapshotSink: Send {
    fn save(&mut self, snapshot: Snapshot) -> anyhow::Result<()>;
    fn load(&mut self, step: u64) -> anyhow::Result<Option<Snapshot>>;
}

/// Frame sink that drops every frame.
#[derive(Debug, Default)]
pub struct NullFrameSink;

impl FrameSink for NullFrameSink {
    fn frame(&mut self, _step: u64, _vortices: &[Vortex], _tracers: &[Tracer]) {}
}

/// In-memory snapshot store, used by tests and as the no-storage default.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    frames: Vec<Snapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Snapshot] {
        &self.frames
    }
}

impl SnapshotSink for MemorySnapshotStore {
    fn save(&mut self, snapshot: Snapshot) -> anyhow::Result<()> {
        self.frames.push(snapshot);
        Ok(())
    }

    fn load(&mut self, step: u64) -> anyhow::Result<Option<Snapshot>> {
        Ok(self.frames.iter().find(|s| s.step == step).cloned())
    }
}
