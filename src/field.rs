// Field storage for the ripple simulation.
//
// Two equally sized float fields hold the committed and in-progress
// simulation state. The pair is a fixed 2-slot arena plus a front index;
// swap() flips the index and never copies or re-seats a reference.

use std::collections::TryReserveError;

/// Channels per texel: 0 = height/displacement, 1 = velocity, 2..3 reserved.
pub const CHANNELS: usize = 4;

pub type Texel = [f32; CHANNELS];

/// Size of a field in device pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn texel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("failed to allocate a {width}x{height} field: {source}")]
    Allocation {
        width: u32,
        height: u32,
        source: TryReserveError,
    },

    #[error("field resolution is zero-area: {0:?}")]
    EmptyResolution(Resolution),

    #[error("resolution mismatch between {left:?} and {right:?}")]
    ResolutionMismatch { left: Resolution, right: Resolution },

    #[error("output buffer too small: have {have} bytes, need {need}")]
    OutputTooSmall { have: usize, need: usize },

    #[error("failed to decode background image: {0}")]
    BackgroundDecode(#[from] image::ImageError),
}

/// A width x height grid of 4-channel float texels, row-major with row 0 at
/// the bottom (matching the pointer sampler's y-up convention).
#[derive(Clone)]
pub struct Field {
    resolution: Resolution,
    texels: Vec<Texel>,
}

impl Field {
    /// Allocate a zero-filled field. Reservation goes through `try_reserve`
    /// so an oversized request surfaces as `SimError::Allocation` instead of
    /// aborting the process.
    pub fn zeroed(resolution: Resolution) -> Result<Self, SimError> {
        let count = resolution.texel_count();
        if count == 0 {
            return Err(SimError::EmptyResolution(resolution));
        }
        let mut texels: Vec<Texel> = Vec::new();
        texels
            .try_reserve_exact(count)
            .map_err(|source| SimError::Allocation {
                width: resolution.width,
                height: resolution.height,
                source,
            })?;
        texels.resize(count, [0.0; CHANNELS]);
        Ok(Self { resolution, texels })
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.resolution.width as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.resolution.height as usize
    }

    #[inline]
    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    #[inline]
    pub fn texels_mut(&mut self) -> &mut [Texel] {
        &mut self.texels
    }

    /// Texel at (x, y) with y = 0 at the bottom row.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Texel {
        self.texels[y * self.width() + x]
    }

    pub fn fill_zero(&mut self) {
        self.texels.fill([0.0; CHANNELS]);
    }

    /// Sum of squared height and velocity over the whole field.
    pub fn energy(&self) -> f64 {
        self.texels
            .iter()
            .map(|t| (t[0] as f64) * (t[0] as f64) + (t[1] as f64) * (t[1] as f64))
            .sum()
    }
}

/// The ping-pong pair: `current()` is the most recently committed state,
/// the other slot is the write target for the next step. A separate zero
/// seed field stands in as the read source on the very first frame.
pub struct FieldPair {
    fields: [Field; 2],
    seed: Field,
    front: usize,
}

impl FieldPair {
    pub fn allocate(resolution: Resolution) -> Result<Self, SimError> {
        Ok(Self {
            fields: [Field::zeroed(resolution)?, Field::zeroed(resolution)?],
            seed: Field::zeroed(resolution)?,
            front: 0,
        })
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.fields[0].resolution()
    }

    /// The most recently committed field.
    #[inline]
    pub fn current(&self) -> &Field {
        &self.fields[self.front]
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.front
    }

    #[inline]
    pub fn seed(&self) -> &Field {
        &self.seed
    }

    /// Borrow the committed field for reading and the other slot for
    /// writing. The two are distinct by construction, so a step can never
    /// read the buffer it is writing.
    pub fn split(&mut self) -> (&Field, &mut Field) {
        let (lo, hi) = self.fields.split_at_mut(1);
        if self.front == 0 {
            (&lo[0], &mut hi[0])
        } else {
            (&hi[0], &mut lo[0])
        }
    }

    /// Borrow the seed field for reading and the back slot for writing.
    /// Used only for the first simulated frame, when no committed state
    /// exists yet.
    pub fn seed_and_back(&mut self) -> (&Field, &mut Field) {
        let back = self.front ^ 1;
        (&self.seed, &mut self.fields[back])
    }

    /// Flip which slot is current. O(1), no data moves.
    #[inline]
    pub fn swap(&mut self) {
        self.front ^= 1;
    }

    /// Zero both slots, returning the simulation to the seed state.
    pub fn reset_to_seed(&mut self) {
        self.fields[0].fill_zero();
        self.fields[1].fill_zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_field_is_zero() {
        let f = Field::zeroed(Resolution::new(8, 4)).unwrap();
        assert_eq!(f.texels().len(), 32);
        assert!(f.texels().iter().all(|t| *t == [0.0; CHANNELS]));
    }

    #[test]
    fn zero_area_resolution_is_rejected() {
        assert!(matches!(
            Field::zeroed(Resolution::new(0, 16)),
            Err(SimError::EmptyResolution(_))
        ));
        assert!(matches!(
            Field::zeroed(Resolution::new(16, 0)),
            Err(SimError::EmptyResolution(_))
        ));
    }

    #[test]
    fn swap_flips_roles_without_copying() {
        let mut pair = FieldPair::allocate(Resolution::new(4, 4)).unwrap();
        assert_eq!(pair.current_index(), 0);

        {
            let (_, dest) = pair.split();
            dest.texels_mut()[0] = [1.0, 0.0, 0.0, 0.0];
        }
        pair.swap();
        assert_eq!(pair.current_index(), 1);
        assert_eq!(pair.current().get(0, 0)[0], 1.0);

        // Split now reads the slot we just wrote and writes the original.
        let (src, dest) = pair.split();
        assert_eq!(src.get(0, 0)[0], 1.0);
        assert_eq!(dest.get(0, 0)[0], 0.0);
    }

    #[test]
    fn split_never_aliases() {
        let mut pair = FieldPair::allocate(Resolution::new(4, 4)).unwrap();
        for _ in 0..5 {
            {
                let (src, dest) = pair.split();
                let dest_ptr: *const Field = &*dest;
                assert!(!std::ptr::eq(src, dest_ptr));
            }
            pair.swap();
        }
    }

    #[test]
    fn reset_to_seed_zeroes_both_slots() {
        let mut pair = FieldPair::allocate(Resolution::new(4, 4)).unwrap();
        {
            let (_, dest) = pair.split();
            dest.texels_mut().fill([3.0, -1.0, 0.0, 0.0]);
        }
        pair.swap();
        pair.reset_to_seed();
        assert_eq!(pair.current().energy(), 0.0);
        let (src, dest) = pair.split();
        assert_eq!(src.energy(), 0.0);
        assert_eq!(dest.energy(), 0.0);
    }
}
