// Ripple evolution rule.
//
// Each texel carries (height, velocity). Per step: pull the height toward
// the 4-neighbor average (spring force), integrate velocity into height,
// damp both, clamp, and add the pointer impulse inside the injection
// radius. Damping strictly below 1 makes the field decay to rest when no
// input arrives; clamping bounds transients so a burst of input cannot
// blow the field up.

use rayon::prelude::*;

use crate::field::{Field, SimError};
use crate::input::PointerSample;

#[derive(Clone, Copy, Debug)]
pub struct RippleParams {
    /// Neighbor coupling per 60 Hz step, scaled by dt at run time.
    pub propagation: f32,
    /// Per-step decay applied to height and velocity. Must stay below 1.
    pub damping: f32,
    /// Displacement added per frame while injecting.
    pub impulse: f32,
    /// Injection radius in field pixels.
    pub inject_radius: f32,
    /// When false, the pointer injects whether or not it is pressed
    /// (the rain variant).
    pub require_press: bool,
    /// Hard bound on |height| and |velocity|.
    pub max_displacement: f32,
}

impl Default for RippleParams {
    fn default() -> Self {
        Self {
            propagation: 0.5,
            damping: 0.985,
            impulse: 2.2,
            inject_radius: 14.0,
            require_press: true,
            max_displacement: 8.0,
        }
    }
}

/// Per-step summary used by the driver for divergence self-healing.
#[derive(Clone, Copy, Debug)]
pub struct StepReport {
    pub peak: f32,
    pub finite: bool,
}

/// Evolve `source` into `dest` by one step. `source` and `dest` are distinct
/// borrows by construction (see `FieldPair::split`), so the committed state
/// is never read and written in the same pass.
pub fn step(
    source: &Field,
    dest: &mut Field,
    pointer: PointerSample,
    params: &RippleParams,
    dt: f32,
) -> Result<StepReport, SimError> {
    if source.resolution() != dest.resolution() {
        return Err(SimError::ResolutionMismatch {
            left: source.resolution(),
            right: dest.resolution(),
        });
    }

    let w = source.width();
    let h = source.height();
    let src = source.texels();

    // Coupling is tuned against a 60 Hz frame; the clamp keeps the scheme
    // stable when a stall produces a huge dt.
    let k = (params.propagation * dt * 60.0).clamp(0.0, 1.0);
    let damping = params.damping.min(0.9999);
    let bound = params.max_displacement.abs().max(f32::EPSILON);

    let inject = pointer.pressed || !params.require_press;
    let r = params.inject_radius.max(0.0);
    let r2 = r * r;

    let (peak, finite) = dest
        .texels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .map(|(y, row)| {
            let ym1 = y.saturating_sub(1);
            let yp1 = (y + 1).min(h - 1);
            let base = y * w;

            let row_near_pointer = inject && (y as f32 + 0.5 - pointer.y).abs() <= r;

            let mut peak = 0.0f32;
            let mut finite = true;

            for x in 0..w {
                let xm1 = x.saturating_sub(1);
                let xp1 = (x + 1).min(w - 1);

                let c = src[base + x];
                let neighbors = src[ym1 * w + x][0]
                    + src[yp1 * w + x][0]
                    + src[y * w + xm1][0]
                    + src[y * w + xp1][0];

                let force = neighbors * 0.25 - c[0];
                let vel = (c[1] + force * k) * damping;
                let mut hgt = (c[0] + vel) * damping;

                if row_near_pointer {
                    let dx = x as f32 + 0.5 - pointer.x;
                    let dy = y as f32 + 0.5 - pointer.y;
                    let d2 = dx * dx + dy * dy;
                    if d2 < r2 {
                        let falloff = 1.0 - d2 / r2;
                        hgt += params.impulse * falloff * falloff;
                    }
                }

                let hgt = hgt.clamp(-bound, bound);
                let vel = vel.clamp(-bound, bound);

                finite &= hgt.is_finite() && vel.is_finite();
                peak = peak.max(hgt.abs());

                row[x] = [hgt, vel, 0.0, 0.0];
            }

            (peak, finite)
        })
        .reduce(|| (0.0f32, true), |a, b| (a.0.max(b.0), a.1 && b.1));

    Ok(StepReport { peak, finite })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldPair, Resolution};

    const DT: f32 = 1.0 / 60.0;

    fn press_at(x: f32, y: f32) -> PointerSample {
        PointerSample {
            x,
            y,
            pressed: true,
        }
    }

    #[test]
    fn mismatched_resolutions_fail_fast() {
        let a = Field::zeroed(Resolution::new(16, 16)).unwrap();
        let mut b = Field::zeroed(Resolution::new(16, 8)).unwrap();
        let err = step(&a, &mut b, PointerSample::idle(), &RippleParams::default(), DT);
        assert!(matches!(err, Err(SimError::ResolutionMismatch { .. })));
    }

    #[test]
    fn pressed_pointer_injects_energy() {
        let mut pair = FieldPair::allocate(Resolution::new(64, 64)).unwrap();
        let params = RippleParams::default();

        let (src, dest) = pair.split();
        step(src, dest, press_at(32.0, 32.0), &params, DT).unwrap();
        pair.swap();
        assert!(pair.current().energy() > 0.0);
    }

    #[test]
    fn released_pointer_injects_nothing() {
        let mut pair = FieldPair::allocate(Resolution::new(64, 64)).unwrap();
        let params = RippleParams::default();

        let pointer = PointerSample {
            x: 32.0,
            y: 32.0,
            pressed: false,
        };
        let (src, dest) = pair.split();
        step(src, dest, pointer, &params, DT).unwrap();
        pair.swap();
        assert_eq!(pair.current().energy(), 0.0);
    }

    #[test]
    fn rain_variant_injects_without_press() {
        let mut pair = FieldPair::allocate(Resolution::new(64, 64)).unwrap();
        let params = RippleParams {
            require_press: false,
            ..RippleParams::default()
        };

        let pointer = PointerSample {
            x: 32.0,
            y: 32.0,
            pressed: false,
        };
        let (src, dest) = pair.split();
        step(src, dest, pointer, &params, DT).unwrap();
        pair.swap();
        assert!(pair.current().energy() > 0.0);
    }

    #[test]
    fn injection_is_local_to_the_radius() {
        let mut pair = FieldPair::allocate(Resolution::new(64, 64)).unwrap();
        let params = RippleParams {
            inject_radius: 4.0,
            ..RippleParams::default()
        };

        let (src, dest) = pair.split();
        step(src, dest, press_at(10.0, 10.0), &params, DT).unwrap();
        pair.swap();

        let cur = pair.current();
        assert!(cur.get(10, 10)[0] > 0.0);
        assert_eq!(cur.get(40, 40)[0], 0.0);
    }

    #[test]
    fn energy_decays_without_input() {
        let mut pair = FieldPair::allocate(Resolution::new(48, 48)).unwrap();
        let params = RippleParams::default();

        // Seed a bump by injecting once, then let the field ring down.
        {
            let (src, dest) = pair.split();
            step(src, dest, press_at(24.0, 24.0), &params, DT).unwrap();
            pair.swap();
        }

        let initial = pair.current().energy();
        assert!(initial > 0.0);

        // Height and velocity trade places as waves propagate, so the raw
        // sum wiggles within a bounded envelope; the envelope itself must
        // only shrink. Check the envelope over 60-step windows and demand
        // near-total decay by the end.
        let mut window_max = 0.0f64;
        let mut prev_window_max = f64::INFINITY;
        let mut last = initial;

        for n in 1..=600 {
            let (src, dest) = pair.split();
            step(src, dest, PointerSample::idle(), &params, DT).unwrap();
            pair.swap();

            last = pair.current().energy();
            assert!(
                last <= initial * 2.05,
                "energy left its bounded envelope: initial {initial}, now {last}"
            );

            window_max = window_max.max(last);
            if n % 60 == 0 {
                assert!(
                    window_max <= prev_window_max * 0.8,
                    "energy envelope failed to decay: {prev_window_max} -> {window_max}"
                );
                prev_window_max = window_max;
                window_max = 0.0;
            }
        }

        assert!(
            last < initial * 1e-3,
            "field failed to ring down: initial {initial}, final {last}"
        );
    }

    #[test]
    fn clamped_values_stay_finite_under_sustained_input() {
        let mut pair = FieldPair::allocate(Resolution::new(32, 32)).unwrap();
        let params = RippleParams {
            impulse: 100.0,
            ..RippleParams::default()
        };

        for _ in 0..120 {
            let (src, dest) = pair.split();
            let report = step(src, dest, press_at(16.0, 16.0), &params, DT).unwrap();
            pair.swap();
            assert!(report.finite);
            assert!(report.peak <= params.max_displacement);
        }
    }
}
