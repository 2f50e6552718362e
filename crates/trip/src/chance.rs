//! Process-local randomness for failure decisions.
//!
//! The generator is an additive lagged-Fibonacci generator (Mitchell–Moore,
//! TAOCP vol. 2 §3.2.2): `X[n] = X[n-24] + X[n-55] mod 2^64`. It is private
//! to `trip` so that injecting faults never perturbs the target's own
//! `rand()` sequence.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of words of generator state.
pub const STATE_WORDS: usize = 56;

const SHORT_LAG: usize = 24;
const LONG_LAG: usize = 55;

/// Outputs discarded after seeding so early draws do not mirror the seed.
const WARMUP_DRAWS: usize = 16 * STATE_WORDS;

/// A source of uniform draws.
pub trait ChanceSource {
    /// Next raw 64-bit output.
    fn next_u64(&self) -> u64;

    /// Uniform draw in `[0, 1)` built from the top 53 bits.
    fn draw(&self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// Mitchell–Moore additive generator state.
#[derive(Debug, Clone)]
pub struct LaggedFibonacci {
    state: [u64; STATE_WORDS],
    cursor: usize,
}

impl LaggedFibonacci {
    /// Seeds the state from a process identity and a time value.
    pub fn from_seed(process: u64, time: u64) -> Self {
        let p = process.max(1);
        let t = time.max(1);

        let mut state = [0u64; STATE_WORDS];
        state[0] = (p / t)
            .wrapping_add(t / p)
            .wrapping_add(t)
            .wrapping_add(p)
            .wrapping_add(t.wrapping_mul(p));
        for i in 1..STATE_WORDS {
            state[i] = state[i - 1].wrapping_mul(p).wrapping_add(t);
        }
        // An all-even state never produces an odd word. The word under the
        // cursor is overwritten before it is read, so mark the last one.
        state[STATE_WORDS - 1] |= 1;

        let mut generator = Self { state, cursor: 0 };
        for _ in 0..WARMUP_DRAWS {
            generator.step();
        }
        generator
    }

    /// Seeds from the current pid, parent pid and wall-clock seconds.
    pub fn from_process() -> Self {
        let pid = u64::from(std::process::id());
        let ppid = u64::from(std::os::unix::process::parent_id());
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::from_seed(pid ^ (ppid << 32), now)
    }

    /// Advances by one word and returns it.
    pub fn step(&mut self) -> u64 {
        let c = self.cursor;
        let value = self.state[(c + STATE_WORDS - SHORT_LAG) % STATE_WORDS]
            .wrapping_add(self.state[(c + STATE_WORDS - LONG_LAG) % STATE_WORDS]);
        self.state[c] = value;
        self.cursor = (c + 1) % STATE_WORDS;
        value
    }
}

/// The shared chance primitive: one generator behind a lock.
///
/// Host threads may draw concurrently; the lock serialises them so every
/// draw consumes exactly one word.
#[derive(Debug)]
pub struct Chance {
    generator: Mutex<LaggedFibonacci>,
}

impl Chance {
    pub fn new(generator: LaggedFibonacci) -> Self {
        Self {
            generator: Mutex::new(generator),
        }
    }

    pub fn from_process() -> Self {
        Self::new(LaggedFibonacci::from_process())
    }
}

impl ChanceSource for Chance {
    fn next_u64(&self) -> u64 {
        // The state is plain integers; a panic elsewhere cannot leave it
        // inconsistent.
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .step()
    }
}
