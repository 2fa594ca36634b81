// Frame driver: the only owner of the field pair, and the per-frame
// sequencing authority. Inactive means no buffers exist and no per-frame
// work happens; Active means one sample + step + swap + composite cycle
// per tick. The first tick after (re)activation consumes the zero seed
// field instead of a not-yet-written buffer, so the step itself never
// sees a missing input.

use std::path::PathBuf;

use crate::composite::{self, Background, CompositeParams};
use crate::field::{Field, FieldPair, Resolution, SimError};
use crate::input::PointerSampler;
use crate::ripple::{self, RippleParams};

/// Where the composite background comes from.
#[derive(Clone, Debug, Default)]
pub enum BackgroundSource {
    /// Generated blue-to-cyan gradient.
    #[default]
    Synthesized,
    /// Decoded from an image file; falls back to the flat color when the
    /// file cannot be read.
    Image(PathBuf),
    /// Flat fallback color only.
    None,
}

struct ActiveState {
    buffers: FieldPair,
    background: Option<Background>,
    /// Simulated frames since activation. The next tick runs frame
    /// `frame + 1`; frame 1 reads the seed field.
    frame: u64,
}

pub struct RippleDriver {
    pub params: RippleParams,
    pub composite: CompositeParams,
    background_source: BackgroundSource,
    sampler: PointerSampler,
    active: Option<ActiveState>,
}

impl RippleDriver {
    pub fn new(
        params: RippleParams,
        composite: CompositeParams,
        background_source: BackgroundSource,
    ) -> Self {
        Self {
            params,
            composite,
            background_source,
            sampler: PointerSampler::new(1.0, 1.0, Resolution::new(1, 1)),
            active: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Frames simulated since the last activation; zero while inactive.
    pub fn frame_count(&self) -> u64 {
        self.active.as_ref().map_or(0, |s| s.frame)
    }

    /// The committed field, for diagnostics and tests.
    pub fn field(&self) -> Option<&Field> {
        self.active.as_ref().map(|s| s.buffers.current())
    }

    /// Allocate buffers and become Active. On failure the driver stays
    /// Inactive and the error surfaces to the caller synchronously; the
    /// host should show a static frame instead of retrying.
    pub fn activate(&mut self, resolution: Resolution) -> Result<(), SimError> {
        let buffers = FieldPair::allocate(resolution)?;
        let background = match &self.background_source {
            BackgroundSource::Synthesized => Some(Background::synthesize(resolution)?),
            BackgroundSource::Image(path) => match Background::from_image(path, resolution) {
                Ok(bg) => Some(bg),
                Err(err) => {
                    log::warn!(
                        "background image {:?} unavailable ({err}); using flat color",
                        path
                    );
                    None
                }
            },
            BackgroundSource::None => None,
        };

        self.sampler.set_field(resolution);
        self.active = Some(ActiveState {
            buffers,
            background,
            frame: 0,
        });
        Ok(())
    }

    /// Drop buffers and background, returning to Inactive.
    pub fn deactivate(&mut self) {
        self.active = None;
    }

    /// Recreate everything at a new resolution. Simulation state does not
    /// survive; the frame counter restarts so the seed field is consumed
    /// again.
    pub fn resize(&mut self, resolution: Resolution) -> Result<(), SimError> {
        self.deactivate();
        self.activate(resolution)
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.sampler.set_viewport(width, height);
    }

    pub fn on_pointer_move(&mut self, screen_x: f32, screen_y: f32) {
        self.sampler.on_pointer_move(screen_x, screen_y);
    }

    pub fn on_pointer_down(&mut self) {
        self.sampler.on_pointer_down();
    }

    pub fn on_pointer_up(&mut self) {
        self.sampler.on_pointer_up();
    }

    /// Run one simulate + composite cycle, writing the displayed image into
    /// `out` (RGBA8, top-down, rows `bytes_per_row` apart).
    ///
    /// Panics if the driver is Inactive: ticking without buffers is a
    /// programming error, not a recoverable condition.
    pub fn tick(&mut self, dt: f32, out: &mut [u8], bytes_per_row: usize) -> Result<(), SimError> {
        let state = self
            .active
            .as_mut()
            .expect("tick() called while the ripple driver is inactive");

        // (1) One pointer sample per simulated frame.
        let sample = self.sampler.sample();
        let frame_index = state.frame + 1;

        // (2) Evolve into the unused slot; frame 1 reads the seed field.
        let report = if frame_index == 1 {
            let (seed, dest) = state.buffers.seed_and_back();
            ripple::step(seed, dest, sample, &self.params, dt)?
        } else {
            let (src, dest) = state.buffers.split();
            ripple::step(src, dest, sample, &self.params, dt)?
        };

        // (3) Commit.
        state.buffers.swap();

        // A corrupted field must never reach the composite; reset and keep
        // the frame loop running.
        if !report.finite {
            log::warn!("non-finite field values at frame {frame_index}; resetting to seed state");
            state.buffers.reset_to_seed();
        }

        // (4) Composite the now-current field.
        composite::render(
            state.buffers.current(),
            state.background.as_ref(),
            out,
            bytes_per_row,
            &self.composite,
        )?;

        // (5) Count the frame.
        state.frame = frame_index;
        Ok(())
    }
}
