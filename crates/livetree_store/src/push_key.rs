//! Chronologically ordered child keys.
//!
//! A key is 8 characters of millisecond timestamp followed by 12 random
//! characters, all drawn from an alphabet whose byte order matches its
//! digit order. Keys generated later always sort after earlier ones, even
//! within the same millisecond or if the clock steps backwards.

use parking_lot::Mutex;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Alphabet for push keys, in ascending byte order.
pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct KeyState {
    last_millis: u64,
    random: [u8; RANDOM_CHARS],
}

/// Generates unique, chronologically ordered child keys.
#[derive(Debug, Default)]
pub struct PushKeyGenerator {
    state: Mutex<KeyState>,
}

impl PushKeyGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a key for the current wall-clock time.
    pub fn next_key(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        self.next_key_at(millis)
    }

    /// Generates a key for the given timestamp in milliseconds.
    pub fn next_key_at(&self, millis: u64) -> String {
        let mut state = self.state.lock();
        let mut millis = millis.max(state.last_millis);

        if millis == state.last_millis {
            // Same millisecond: bump the random suffix so order is kept.
            let mut carry = true;
            for digit in state.random.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    carry = false;
                    break;
                }
            }
            // Suffix exhausted; move on to the next millisecond.
            if carry {
                millis += 1;
                state.last_millis = millis;
            }
        } else {
            state.last_millis = millis;
            let mut rng = rand::thread_rng();
            for digit in state.random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
        }

        let mut time_chars = [0u8; TIME_CHARS];
        let mut remaining = millis;
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }

        let mut key = String::with_capacity(TIME_CHARS + RANDOM_CHARS);
        key.extend(time_chars.iter().map(|&c| c as char));
        key.extend(
            state
                .random
                .iter()
                .map(|&digit| PUSH_CHARS[digit as usize] as char),
        );
        key
    }
}
