use crate::foundation::{
    core::SeedPattern,
    error::{StereoError, StereoResult},
};

/// Small deterministic generator used for seed strips.
#[derive(Clone, Copy, Debug)]
pub struct Rng64 {
    state: u64,
}

impl Rng64 {
    /// Start a stream from `seed`. Equal seeds yield equal streams.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Start a stream from a seed drawn from the thread-local OS-seeded generator.
    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    /// Next 64 random bits.
    pub fn next_u64(&mut self) -> u64 {
        // SplitMix64
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Fill `dst` with uniform bytes.
    pub fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Generate a `width x height` seed strip of independent uniform intensities in `[0, 255]`.
///
/// `seed: None` draws fresh entropy, so two calls will almost surely differ. Pass a seed to
/// make the strip (and therefore the whole stereogram) reproducible.
pub fn generate_pattern(width: u32, height: u32, seed: Option<u64>) -> StereoResult<SeedPattern> {
    if width == 0 {
        return Err(StereoError::validation("pattern width must be >= 1"));
    }
    if height == 0 {
        return Err(StereoError::validation("pattern height must be >= 1"));
    }

    let mut rng = match seed {
        Some(s) => Rng64::new(s),
        None => Rng64::from_entropy(),
    };
    let mut data = vec![0u8; (width as usize) * (height as usize)];
    rng.fill_bytes(&mut data);
    SeedPattern::new(width, height, data)
}

#[cfg(test)]
#[path = "../../tests/unit/synth/pattern.rs"]
mod tests;
