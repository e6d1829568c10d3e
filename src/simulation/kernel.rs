//! Induced-velocity kernel with periodic images.
//!
//! A point vortex of intensity Γ induces a velocity of magnitude
//! `Γ / (2π r)` at distance `r`, directed perpendicular to the separation
//! vector (counter-clockwise for positive Γ). Under periodic boundary
//! conditions the domain is replicated in a 3x3 tiling and each of the 8
//! image copies contributes as well, subject to a truncation radius.

use super::radii::{index_tv, index_vv};
use super::shared::SharedRadii;
use super::states::NVec2;

/// Offsets of the 8 image domains in the 3x3 tiling, in units of the
/// domain extent:
///
/// ```text
///   1 2 3
///   4 . 5
///   6 7 8
/// ```
const IMAGE_OFFSETS: [(f64, f64); 8] = [
    (-1.0, 1.0),
    (0.0, 1.0),
    (1.0, 1.0),
    (-1.0, 0.0),
    (1.0, 0.0),
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
];

/// Velocity kernel over the primary domain and its periodic images.
#[derive(Debug, Clone)]
pub struct PeriodicVelocityKernel {
    pub domain_x: f64, // domain width; doubles as the truncation radius
    pub domain_y: f64, // domain height
    pub images: usize, // how many image domains to sum, 0 disables wrapping
    pub probe_cutoff: Option<f64>, // near-field skip, only set by the single-probe analytic setup
}

impl PeriodicVelocityKernel {
    /// Speed induced by a vortex of `intensity` at separation `radius`.
    /// Undefined at zero separation; the self-exclusion and truncation
    /// checks must run before this divides.
    #[inline]
    fn speed(intensity: f64, radius: f64) -> f64 {
        intensity / (2.0 * std::f64::consts::PI * radius)
    }

    /// Velocity induced on the vortex in `slot` by every other vortex,
    /// evaluated against the distance records in `radii`.
    ///
    /// `intensities[j]` is the circulation strength of slot j. A vortex
    /// never interacts with itself.
    pub fn vortex_velocity(&self, slot: usize, intensities: &[f64], radii: &[f64]) -> NVec2 {
        let n = intensities.len();
        let mut vel = NVec2::zeros();

        for other in 0..n {
            if other == slot {
                continue;
            }
            let base = index_vv(slot, other);

            // The stored delta is position[lower] - position[higher];
            // orient it as (other - self) regardless of which side we are.
            let sign = if slot < other { -1.0 } else { 1.0 };
            let rx = sign * radii[base + 1];
            let ry = sign * radii[base + 2];

            for image in 0..=self.images {
                let (r, ix, iy) = if image == 0 {
                    // primary domain: magnitude is already cached
                    (radii[base], rx, ry)
                } else {
                    // image domain: shift the separation by the domain
                    // extent and recompute the magnitude
                    let (ox, oy) = IMAGE_OFFSETS[image - 1];
                    let ix = rx + ox * self.domain_x;
                    let iy = ry + oy * self.domain_y;
                    ((ix * ix + iy * iy).sqrt(), ix, iy)
                };

                if r > self.domain_x {
                    continue; // domain truncation
                }

                let vmag = Self::speed(intensities[other], r);
                vel.x += (iy / r) * vmag;
                vel.y += (-ix / r) * vmag;
            }
        }

        vel
    }

    /// Velocity induced on tracer `tracer` by every vortex, evaluated
    /// against the shared intermediate tracer records.
    ///
    /// Same kernel as [`Self::vortex_velocity`] plus the near-field cutoff
    /// guard: when `probe_cutoff` is set, separations below it are skipped
    /// so a tracer sitting on a vortex does not see a singular speed.
    pub fn tracer_velocity(
        &self,
        tracer: usize,
        intensities: &[f64],
        radii: &SharedRadii,
    ) -> NVec2 {
        let n = intensities.len();
        let mut vel = NVec2::zeros();

        for vort in 0..n {
            let base = index_tv(tracer, vort, n);
            // stored delta is (vortex - tracer), already (other - self)
            let rx = radii.load(base + 1);
            let ry = radii.load(base + 2);

            for image in 0..=self.images {
                let (r, ix, iy) = if image == 0 {
                    (radii.load(base), rx, ry)
                } else {
                    let (ox, oy) = IMAGE_OFFSETS[image - 1];
                    let ix = rx + ox * self.domain_x;
                    let iy = ry + oy * self.domain_y;
                    ((ix * ix + iy * iy).sqrt(), ix, iy)
                };

                if r > self.domain_x {
                    continue; // domain truncation
                }
                if let Some(cutoff) = self.probe_cutoff {
                    if r < cutoff {
                        continue;
                    }
                }

                let vmag = Self::speed(intensities[vort], r);
                vel.x += (iy / r) * vmag;
                vel.y += (-ix / r) * vmag;
            }
        }

        vel
    }
}
