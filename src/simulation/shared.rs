//! Lock-free shared distance buffers used inside an RK4 stage.
//!
//! Vortex work units running in the same stage update overlapping records
//! of the working distance table (vortex i's motion changes its separation
//! from vortex j, and both workers may be live at once). All cross-thread
//! mutation is confined to this module: an f64 cell over `AtomicU64` bits
//! with a compare-and-swap retry loop, and a table of such cells exposing
//! "accumulate a contribution" rather than raw addresses.
//!
//! The CAS loops spin until they succeed. A loop that could not converge
//! would be a logic error, not a recoverable runtime condition; there is no
//! backoff and no failure path.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` stored as raw bits in an `AtomicU64`.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::SeqCst);
    }

    /// Single CAS attempt; on failure returns the current value.
    /// Comparison is on the bit pattern, which is what makes the retry
    /// loop exact (no -0.0 / NaN equality surprises).
    pub fn compare_exchange(&self, current: f64, new: f64) -> Result<(), f64> {
        self.0
            .compare_exchange(
                current.to_bits(),
                new.to_bits(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(f64::from_bits)
    }

    /// Retry-until-success update with the current value fed to `f`.
    pub fn fetch_update(&self, mut f: impl FnMut(f64) -> f64) -> f64 {
        let mut current = self.load();
        loop {
            let new = f(current);
            match self.compare_exchange(current, new) {
                Ok(()) => return new,
                Err(actual) => current = actual,
            }
        }
    }
}

/// A flat distance table whose every entry is an [`AtomicF64`].
///
/// Serves two roles in the integrator:
/// - the working vortex table, mutated by concurrent CAS accumulation,
/// - the intermediate tracer table, where writers never overlap within a
///   phase and plain load/store suffices.
#[derive(Debug)]
pub struct SharedRadii {
    cells: Vec<AtomicF64>,
}

impl SharedRadii {
    /// Seed the table from a plain snapshot.
    pub fn from_slice(src: &[f64]) -> Self {
        Self {
            cells: src.iter().map(|&v| AtomicF64::new(v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn load(&self, index: usize) -> f64 {
        self.cells[index].load()
    }

    pub fn store(&self, index: usize, value: f64) {
        self.cells[index].store(value);
    }

    /// Add `delta` to one entry via CAS retry.
    pub fn accumulate(&self, index: usize, delta: f64) {
        self.cells[index].fetch_update(|old| old + delta);
    }

    /// Recompute the magnitude of the record at `base` from a fresh
    /// snapshot of its dx/dy entries, via CAS retry.
    ///
    /// Re-reading the components inside the loop is what keeps concurrent
    /// writers from publishing a magnitude computed from mismatched
    /// pre/post-update component pairs.
    pub fn refresh_magnitude(&self, base: usize) {
        let cell = &self.cells[base];
        let mut current = cell.load();
        loop {
            let dx = self.load(base + 1);
            let dy = self.load(base + 2);
            let new = (dx * dx + dy * dy).sqrt();
            match cell.compare_exchange(current, new) {
                Ok(()) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Copy the whole table into a plain buffer (inter-stage fold).
    pub fn copy_into(&self, dst: &mut [f64]) {
        debug_assert_eq!(dst.len(), self.cells.len());
        for (d, c) in dst.iter_mut().zip(&self.cells) {
            *d = c.load();
        }
    }

    /// Overwrite the whole table from a plain buffer (inter-stage reset).
    pub fn copy_from(&self, src: &[f64]) {
        debug_assert_eq!(src.len(), self.cells.len());
        for (c, s) in self.cells.iter().zip(src) {
            c.store(*s);
        }
    }
}
