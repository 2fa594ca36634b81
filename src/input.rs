// Pointer sampling.
//
// Pointer events arrive from the host event loop at arbitrary frequency;
// only the latest position and button state matter to the simulation, so
// the sampler is a single overwritten record, not a queue. The frame loop
// reads it exactly once per simulated frame via sample().

use crate::field::Resolution;

/// The latest pointer reading in field-pixel coordinates, y-up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub pressed: bool,
}

impl PointerSample {
    pub const fn idle() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            pressed: false,
        }
    }
}

pub struct PointerSampler {
    viewport_w: f32,
    viewport_h: f32,
    field: Resolution,
    latest: PointerSample,
}

impl PointerSampler {
    pub fn new(viewport_w: f32, viewport_h: f32, field: Resolution) -> Self {
        Self {
            viewport_w: viewport_w.max(1.0),
            viewport_h: viewport_h.max(1.0),
            field,
            latest: PointerSample::idle(),
        }
    }

    pub fn set_viewport(&mut self, viewport_w: f32, viewport_h: f32) {
        self.viewport_w = viewport_w.max(1.0);
        self.viewport_h = viewport_h.max(1.0);
    }

    /// Retarget the sampler to a new field resolution (on resize). The
    /// recorded position is remapped so a stationary cursor stays put.
    pub fn set_field(&mut self, field: Resolution) {
        if self.field.texel_count() > 0 {
            let sx = field.width as f32 / self.field.width as f32;
            let sy = field.height as f32 / self.field.height as f32;
            self.latest.x *= sx;
            self.latest.y *= sy;
        }
        self.field = field;
    }

    /// Record a pointer position given in screen coordinates (y-down).
    /// The stored position is in field pixels with the origin at the
    /// bottom-left, matching the evolution rule's coordinate system.
    pub fn on_pointer_move(&mut self, screen_x: f32, screen_y: f32) {
        self.latest.x = (screen_x / self.viewport_w) * self.field.width as f32;
        self.latest.y = (1.0 - screen_y / self.viewport_h) * self.field.height as f32;
    }

    pub fn on_pointer_down(&mut self) {
        self.latest.pressed = true;
    }

    pub fn on_pointer_up(&mut self) {
        self.latest.pressed = false;
    }

    /// Latest (position, pressed) pair. Never blocks, never fails.
    #[inline]
    pub fn sample(&self) -> PointerSample {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_screen_to_field_with_y_flip() {
        let mut s = PointerSampler::new(200.0, 100.0, Resolution::new(100, 50));
        s.on_pointer_move(100.0, 0.0);
        let p = s.sample();
        assert_eq!(p.x, 50.0);
        assert_eq!(p.y, 50.0); // top of the screen is the top of the field

        s.on_pointer_move(0.0, 100.0);
        let p = s.sample();
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 0.0); // bottom of the screen is field y = 0
    }

    #[test]
    fn sample_is_idempotent_between_events() {
        let mut s = PointerSampler::new(100.0, 100.0, Resolution::new(100, 100));
        s.on_pointer_move(33.0, 66.0);
        s.on_pointer_down();
        let a = s.sample();
        let b = s.sample();
        assert_eq!(a, b);
    }

    #[test]
    fn last_writer_wins() {
        let mut s = PointerSampler::new(100.0, 100.0, Resolution::new(100, 100));
        s.on_pointer_move(10.0, 10.0);
        s.on_pointer_move(20.0, 20.0);
        s.on_pointer_down();
        s.on_pointer_up();
        let p = s.sample();
        assert_eq!(p.x, 20.0);
        assert!(!p.pressed);
    }

    #[test]
    fn retargeting_rescales_position() {
        let mut s = PointerSampler::new(100.0, 100.0, Resolution::new(100, 100));
        s.on_pointer_move(50.0, 50.0);
        s.set_field(Resolution::new(200, 200));
        let p = s.sample();
        assert_eq!(p.x, 100.0);
        assert_eq!(p.y, 100.0);
    }
}
