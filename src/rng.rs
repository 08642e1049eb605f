use rand::Rng as _;

/// Mulberry32 stream. Bit-compatible with the JS generator the replay files
/// were recorded against, so a seed reproduces the same food layout.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        out as f64 / 4_294_967_296.0
    }

    pub fn next_f32(&mut self) -> f32 {
        self.next_f64() as f32
    }

    pub fn int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        min + (self.next_f64() * span).floor() as i32
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f64() * len as f64).floor().min((len - 1) as f64) as usize
    }
}

/// Anything that can hand out uniform samples in `[0, 1)`.
///
/// World placement is written against this so the same code path serves the
/// seeded bulk pass and the entropy-backed single-slot respawn.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;

    /// Uniform integer in `0..=max`.
    fn cell(&mut self, max: i32) -> i32 {
        (self.next_unit() * (max + 1) as f64).floor() as i32
    }
}

impl RandomSource for Rng {
    fn next_unit(&mut self) -> f64 {
        self.next_f64()
    }
}

impl RandomSource for rand::rngs::ThreadRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

impl RandomSource for rand::rngs::SmallRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}
