// The effect roster and the stateless shaders.
//
// Every effect except the ripple is a pure function of (uv, time, params)
// evaluated per pixel by a row-parallel full-screen pass. The ripple is
// stateful and lives in driver/ripple; its entry here only names it in the
// gallery and paints the flat static frame used when the simulation is
// unavailable.

use rayon::prelude::*;

use crate::field::Resolution;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Ripple,
    GradientFog,
    Plasma,
    Aurora,
    StarGlitter,
}

impl Effect {
    pub fn all() -> &'static [Effect] {
        &[
            Effect::Ripple,
            Effect::GradientFog,
            Effect::Plasma,
            Effect::Aurora,
            Effect::StarGlitter,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Effect::Ripple => "RIPPLE",
            Effect::GradientFog => "GRADIENT FOG",
            Effect::Plasma => "PLASMA",
            Effect::Aurora => "AURORA",
            Effect::StarGlitter => "STAR GLITTER",
        }
    }

    /// True for the one effect that keeps state between frames.
    pub fn is_stateful(self) -> bool {
        matches!(self, Effect::Ripple)
    }

    pub fn parse(name: &str) -> Option<Effect> {
        let name = name.to_lowercase();
        Effect::all()
            .iter()
            .copied()
            .find(|e| e.label().to_lowercase().replace(' ', "-") == name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EffectParams {
    pub speed: f32,
    pub scale: f32,
    pub color1: [f32; 3],
    pub color2: [f32; 3],
    pub color3: [f32; 3],
    pub star_density: f32,
    pub twinkle_speed: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            speed: 0.5,
            scale: 5.0,
            color1: [0.0, 0.0, 0.0],
            color2: [0.0, 0.5, 1.0],
            color3: [0.5, 0.0, 1.0],
            star_density: 0.4,
            twinkle_speed: 2.0,
        }
    }
}

// Flat frame shown when the ripple simulation is unavailable; matches the
// composite's flat fallback.
const STATIC_FRAME: [f32; 3] = [10.0 / 255.0, 24.0 / 255.0, 46.0 / 255.0];

#[inline]
fn mix3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[inline]
fn hash2(x: u32, y: u32, seed: u32) -> u32 {
    let mut n = x
        .wrapping_mul(0x9E37_79B1)
        .wrapping_add(y.wrapping_mul(0x85EB_CA6B))
        ^ seed;
    n ^= n >> 15;
    n = n.wrapping_mul(0x2C1B_3C6D);
    n ^= n >> 12;
    n = n.wrapping_mul(0x297A_2D39);
    n ^= n >> 15;
    n
}

#[inline]
fn hash01(x: u32, y: u32, seed: u32) -> f32 {
    (hash2(x, y, seed) >> 8) as f32 / 16_777_216.0
}

fn shade_static(_u: f32, _v: f32, _t: f32, _p: &EffectParams) -> [f32; 3] {
    STATIC_FRAME
}

fn shade_gradient_fog(u: f32, v: f32, t: f32, p: &EffectParams) -> [f32; 3] {
    let sway = (t * 0.2 * p.speed.max(0.05)).sin() * 0.25;
    let base = mix3(p.color1, p.color2, (u + sway).clamp(0.0, 1.0));
    let fog = 0.5 + 0.5 * ((u * 3.0 + t * 0.3).sin() * (v * 2.0 - t * 0.2).cos());
    mix3(base, p.color3, fog * v * 0.6)
}

fn shade_plasma(u: f32, v: f32, t: f32, p: &EffectParams) -> [f32; 3] {
    let ts = t * p.speed;
    let x = u * p.scale;
    let y = v * p.scale;

    let v1 = (x + ts).sin();
    let v2 = ((x * (ts * 0.5).sin() + y * (ts / 3.0).cos()) + ts).sin();
    let v3 = ((x * x + y * y).sqrt() + ts * 1.5).sin();
    let s = (v1 + v2 + v3) / 3.0 * 0.5 + 0.5;

    if s < 0.5 {
        mix3(p.color1, p.color2, s * 2.0)
    } else {
        mix3(p.color2, p.color3, (s - 0.5) * 2.0)
    }
}

fn shade_aurora(u: f32, v: f32, t: f32, p: &EffectParams) -> [f32; 3] {
    let mut out = mix3([0.01, 0.02, 0.06], p.color1, v * 0.25);

    let curtains = [(p.color2, 0.62, 0.30), (p.color3, 0.50, 0.45), (p.color2, 0.74, 0.22)];
    for (i, (color, center, drift)) in curtains.iter().enumerate() {
        let phase = i as f32 * 2.1;
        let wave = (u * 2.5 * p.scale * 0.5 + t * p.speed * (0.3 + i as f32 * 0.13) + phase).sin();
        let band_y = center + wave * 0.12;
        let d = (v - band_y) * (6.0 + i as f32 * 2.0);
        let ribbon = (-d * d).exp();
        let shimmer = 0.6 + 0.4 * (u * 18.0 + t * p.speed * 2.0 + phase).sin();
        let k = ribbon * shimmer * drift / 0.45;
        out = [
            (out[0] + color[0] * k).min(1.0),
            (out[1] + color[1] * k).min(1.0),
            (out[2] + color[2] * k).min(1.0),
        ];
    }
    out
}

fn shade_star_glitter(u: f32, v: f32, t: f32, p: &EffectParams) -> [f32; 3] {
    // Cell grid; each cell may hold one star at a hashed sub-position.
    let grid = 48.0;
    let gx = u * grid;
    let gy = v * grid * 0.6;
    let cx = gx.floor();
    let cy = gy.floor();

    let mut out = mix3([0.0, 0.01, 0.03], p.color1, v * 0.15);

    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            let ix = (cx as i32 + dx) as u32;
            let iy = (cy as i32 + dy) as u32;
            if hash01(ix, iy, 1) > p.star_density {
                continue;
            }
            let sx = ix as f32 + hash01(ix, iy, 2);
            let sy = iy as f32 + hash01(ix, iy, 3);
            let dxx = gx - sx;
            let dyy = gy - sy;
            let d2 = dxx * dxx + dyy * dyy;

            let twinkle =
                0.5 + 0.5 * (t * p.twinkle_speed + hash01(ix, iy, 4) * std::f32::consts::TAU).sin();
            let glow = (-d2 * 9.0).exp() * twinkle;

            let tint = mix3([1.0, 1.0, 1.0], p.color2, hash01(ix, iy, 5));
            out = [
                (out[0] + tint[0] * glow).min(1.0),
                (out[1] + tint[1] * glow).min(1.0),
                (out[2] + tint[2] * glow).min(1.0),
            ];
        }
    }
    out
}

/// Full-screen stateless pass into an RGBA8 top-down buffer with padded
/// rows. `Effect::Ripple` paints the flat static frame (the fallback when
/// the simulation could not be activated).
pub fn render(
    effect: Effect,
    t: f32,
    resolution: Resolution,
    params: &EffectParams,
    out: &mut [u8],
    bytes_per_row: usize,
) {
    let w = resolution.width as usize;
    let h = resolution.height as usize;
    if w == 0 || h == 0 || bytes_per_row < w * 4 {
        return;
    }

    let shade: fn(f32, f32, f32, &EffectParams) -> [f32; 3] = match effect {
        Effect::Ripple => shade_static,
        Effect::GradientFog => shade_gradient_fog,
        Effect::Plasma => shade_plasma,
        Effect::Aurora => shade_aurora,
        Effect::StarGlitter => shade_star_glitter,
    };

    out.par_chunks_mut(bytes_per_row)
        .take(h)
        .enumerate()
        .for_each(|(iy, row)| {
            // GL-style v: 0 at the bottom of the screen.
            let v = 1.0 - (iy as f32 + 0.5) / h as f32;
            for x in 0..w {
                let u = (x as f32 + 0.5) / w as f32;
                let c = shade(u, v, t, params);
                let off = x * 4;
                row[off] = (c[0].clamp(0.0, 1.0) * 255.0) as u8;
                row[off + 1] = (c[1].clamp(0.0, 1.0) * 255.0) as u8;
                row[off + 2] = (c[2].clamp(0.0, 1.0) * 255.0) as u8;
                row[off + 3] = 255;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_labels() {
        for &e in Effect::all() {
            let name = e.label().to_lowercase().replace(' ', "-");
            assert_eq!(Effect::parse(&name), Some(e));
        }
        assert_eq!(Effect::parse("nope"), None);
    }

    #[test]
    fn plasma_is_not_uniform() {
        let res = Resolution::new(32, 32);
        let mut out = vec![0u8; 32 * 32 * 4];
        render(
            Effect::Plasma,
            1.7,
            res,
            &EffectParams::default(),
            &mut out,
            32 * 4,
        );
        let first = out[..4].to_vec();
        assert!(out.chunks_exact(4).any(|px| px != first.as_slice()));
    }

    #[test]
    fn ripple_fallback_frame_is_uniform() {
        let res = Resolution::new(16, 16);
        let mut out = vec![0u8; 16 * 16 * 4];
        render(
            Effect::Ripple,
            0.0,
            res,
            &EffectParams::default(),
            &mut out,
            16 * 4,
        );
        let first = out[..4].to_vec();
        assert!(out.chunks_exact(4).all(|px| px == first.as_slice()));
    }

    #[test]
    fn stateless_passes_are_deterministic() {
        let res = Resolution::new(24, 24);
        let params = EffectParams::default();
        let mut a = vec![0u8; 24 * 24 * 4];
        let mut b = vec![0u8; 24 * 24 * 4];
        render(Effect::StarGlitter, 3.2, res, &params, &mut a, 24 * 4);
        render(Effect::StarGlitter, 3.2, res, &params, &mut b, 24 * 4);
        assert_eq!(a, b);
    }
}
