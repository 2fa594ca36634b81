// src/tuning.rs
//
// This file is the CONTROL PANEL. If you want to change behavior, change
// it here.
//
// A "retarget window" uses one duration for two things: how long a dial
// eases to a new target, AND when the next target is chosen (at the end of
// that ease). So "retarget 4-10s" means "glide to a new value over 4-10
// seconds; on arrival, pick another".

use rand::Rng;

#[derive(Clone, Copy, Debug)]
pub struct SecondsRange {
    pub min: f32,
    pub max: f32,
}

impl SecondsRange {
    #[inline]
    pub fn pick<R: Rng + ?Sized>(self, rng: &mut R) -> f32 {
        rng.random_range(self.min..self.max)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RangeF32 {
    pub min: f32,
    pub max: f32,
}

impl RangeF32 {
    #[inline]
    pub fn pick<R: Rng + ?Sized>(self, rng: &mut R) -> f32 {
        rng.random_range(self.min..self.max)
    }

    #[inline]
    pub fn clamp(self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// A value easing toward its target with smoothstep, retargeting itself
/// when it arrives.
#[derive(Clone, Copy)]
pub struct Transition {
    pub cur: f32,
    start: f32,
    target: f32,
    t0: f32,
    dur: f32,
    next_change: f32,
    lo: f32,
    hi: f32,
    min_dur: f32,
    max_dur: f32,
}

impl Transition {
    pub fn new(v: f32, lo: f32, hi: f32, min_dur: f32, max_dur: f32) -> Self {
        Self {
            cur: v,
            start: v,
            target: v,
            t0: 0.0,
            dur: 1.0,
            next_change: min_dur,
            lo,
            hi,
            min_dur,
            max_dur,
        }
    }

    pub fn set_target(&mut self, now: f32, v: f32, dur: f32) {
        self.start = self.cur;
        self.target = v.clamp(self.lo, self.hi);
        self.t0 = now;
        self.dur = dur.max(0.001);
        self.next_change = now + self.dur;
    }

    pub fn maybe_new_target<R: Rng + ?Sized, F: FnOnce(&mut R) -> f32>(
        &mut self,
        now: f32,
        rng: &mut R,
        pick: F,
    ) {
        if now >= self.next_change {
            let dur = rng.random_range(self.min_dur..self.max_dur);
            let v = pick(rng);
            self.set_target(now, v, dur);
        }
    }

    pub fn update(&mut self, now: f32) -> f32 {
        let t = (now - self.t0) / self.dur;
        let u = smoothstep(t);
        self.cur = (self.start + (self.target - self.start) * u).clamp(self.lo, self.hi);
        self.cur
    }
}

#[derive(Clone, Copy)]
pub struct ColorTransition {
    pub cur: [u8; 3],
    start: [u8; 3],
    target: [u8; 3],
    t0: f32,
    dur: f32,
    next_change: f32,
    min_dur: f32,
    max_dur: f32,
}

impl ColorTransition {
    pub fn new(rgb: [u8; 3], min_dur: f32, max_dur: f32) -> Self {
        Self {
            cur: rgb,
            start: rgb,
            target: rgb,
            t0: 0.0,
            dur: 1.0,
            next_change: min_dur,
            min_dur,
            max_dur,
        }
    }

    pub fn set_target(&mut self, now: f32, rgb: [u8; 3], dur: f32) {
        self.start = self.cur;
        self.target = rgb;
        self.t0 = now;
        self.dur = dur.max(0.001);
        self.next_change = now + self.dur;
    }

    pub fn maybe_new_target<R: Rng + ?Sized, F: FnOnce(&mut R) -> [u8; 3]>(
        &mut self,
        now: f32,
        rng: &mut R,
        pick: F,
    ) {
        if now >= self.next_change {
            let dur = rng.random_range(self.min_dur..self.max_dur);
            let rgb = pick(rng);
            self.set_target(now, rgb, dur);
        }
    }

    pub fn update(&mut self, now: f32) -> [u8; 3] {
        let t = (now - self.t0) / self.dur;
        let u = smoothstep(t);
        let mut out = [0u8; 3];
        for i in 0..3 {
            let a = self.start[i] as f32;
            let b = self.target[i] as f32;
            out[i] = (a + (b - a) * u).round().clamp(0.0, 255.0) as u8;
        }
        self.cur = out;
        out
    }
}

/// An animated "dial" for f32 values.
///
/// - initial: starting value
/// - range: allowed min/max
/// - retarget: how long a new target takes and how often targets change
/// - enabled: if false, it stays at initial forever
#[derive(Clone, Copy, Debug)]
pub struct AnimatedF32 {
    pub enabled: bool,
    pub initial: f32,
    pub range: RangeF32,
    pub retarget: SecondsRange,
}

impl AnimatedF32 {
    #[inline]
    pub fn make_transition(self) -> Transition {
        Transition::new(
            self.initial,
            self.range.min,
            self.range.max,
            self.retarget.min,
            self.retarget.max,
        )
    }

    #[inline]
    pub fn maybe_retarget<R: Rng + ?Sized>(self, tr: &mut Transition, now: f32, rng: &mut R) {
        if !self.enabled {
            return;
        }
        tr.maybe_new_target(now, rng, |r| self.range.pick(r));
    }
}

/// Animated palette color: random RGB components in
/// [component_min..=component_max], drifting over the retarget window.
#[derive(Clone, Copy, Debug)]
pub struct AnimatedColor {
    pub enabled: bool,
    pub initial: [u8; 3],
    pub component_min: u8,
    pub component_max: u8,
    pub retarget: SecondsRange,
}

impl AnimatedColor {
    #[inline]
    pub fn make_transition(self) -> ColorTransition {
        ColorTransition::new(self.initial, self.retarget.min, self.retarget.max)
    }

    #[inline]
    pub fn pick_random_rgb<R: Rng + ?Sized>(self, rng: &mut R) -> [u8; 3] {
        [
            rng.random_range(self.component_min..=self.component_max),
            rng.random_range(self.component_min..=self.component_max),
            rng.random_range(self.component_min..=self.component_max),
        ]
    }

    #[inline]
    pub fn maybe_retarget<R: Rng + ?Sized>(self, ct: &mut ColorTransition, now: f32, rng: &mut R) {
        if !self.enabled {
            return;
        }
        ct.maybe_new_target(now, rng, |r| self.pick_random_rgb(r));
    }
}

/// Ripple constants. The interactive keys adjust impulse and radius inside
/// the ranges given here; damping stays fixed and strictly below 1 so the
/// field always rings down.
#[derive(Clone, Copy, Debug)]
pub struct RippleTuning {
    pub damping: f32,
    pub propagation: f32,
    pub impulse: f32,
    pub impulse_range: RangeF32,
    pub inject_radius: f32,
    pub radius_range: RangeF32,
    pub max_displacement: f32,
}

/// Idle auto-drip: a wandering synthetic pointer that presses now and then
/// so the ripple stays alive when nobody is touching it.
#[derive(Clone, Copy, Debug)]
pub struct DripTuning {
    pub drips_per_second: AnimatedF32,
    /// Retarget window for the drip cursor's glide targets.
    pub wander: SecondsRange,
    /// How long a synthetic press lasts, seconds.
    pub press_duration: RangeF32,
    /// Real input suppresses the drip for this long.
    pub idle_after_seconds: f32,
}

/// Speed/scale drift for the stateless effects.
#[derive(Clone, Copy, Debug)]
pub struct EffectMotionTuning {
    pub speed: AnimatedF32,
    pub scale: AnimatedF32,
}

/// The three-color palette shared by the stateless effects.
#[derive(Clone, Copy, Debug)]
pub struct PaletteTuning {
    pub color1: AnimatedColor,
    pub color2: AnimatedColor,
    pub color3: AnimatedColor,
}

#[derive(Clone, Copy, Debug)]
pub struct ControlPanel {
    pub rng_seed: u64,
    pub ripple: RippleTuning,
    pub drip: DripTuning,
    pub motion: EffectMotionTuning,
    pub palette: PaletteTuning,
}

impl ControlPanel {
    /// Build a sane default panel for a given display size. This is the
    /// only place where size-dependent maxima (injection radius) are
    /// computed.
    pub fn for_display(w: usize, h: usize) -> Self {
        let radius_max = ((w.min(h) as f32) / 8.0).max(8.0);
        let retarget_default = SecondsRange { min: 4.0, max: 10.0 };

        Self {
            rng_seed: 0xC0FF_EE12_3456_789A,

            ripple: RippleTuning {
                damping: 0.985,
                propagation: 0.5,
                impulse: 2.2,
                impulse_range: RangeF32 { min: 0.2, max: 8.0 },
                inject_radius: 14.0_f32.min(radius_max),
                radius_range: RangeF32 {
                    min: 4.0,
                    max: radius_max,
                },
                max_displacement: 8.0,
            },

            drip: DripTuning {
                drips_per_second: AnimatedF32 {
                    enabled: true,
                    initial: 0.6,
                    range: RangeF32 { min: 0.2, max: 1.5 },
                    retarget: retarget_default,
                },
                wander: SecondsRange { min: 2.0, max: 6.0 },
                press_duration: RangeF32 {
                    min: 0.05,
                    max: 0.18,
                },
                idle_after_seconds: 5.0,
            },

            motion: EffectMotionTuning {
                speed: AnimatedF32 {
                    enabled: true,
                    initial: 0.5,
                    range: RangeF32 { min: 0.2, max: 1.2 },
                    retarget: retarget_default,
                },
                scale: AnimatedF32 {
                    enabled: true,
                    initial: 5.0,
                    range: RangeF32 { min: 2.5, max: 9.0 },
                    retarget: SecondsRange {
                        min: 8.0,
                        max: 16.0,
                    },
                },
            },

            palette: PaletteTuning {
                color1: AnimatedColor {
                    enabled: false, // keep the dark base stable
                    initial: [0, 0, 0],
                    component_min: 0,
                    component_max: 40,
                    retarget: SecondsRange {
                        min: 8.0,
                        max: 14.0,
                    },
                },
                color2: AnimatedColor {
                    enabled: true,
                    initial: [0, 128, 255],
                    component_min: 40,
                    component_max: 255,
                    retarget: retarget_default,
                },
                color3: AnimatedColor {
                    enabled: true,
                    initial: [128, 0, 255],
                    component_min: 40,
                    component_max: 255,
                    retarget: retarget_default,
                },
            },
        }
    }
}

/// 0..255 RGB to the 0..1 triples the effect shaders take.
#[inline]
pub fn rgb01(rgb: [u8; 3]) -> [f32; 3] {
    [
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    ]
}
