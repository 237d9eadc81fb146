use std::sync::atomic::{AtomicU64, Ordering};

use stream_api::Message;
use stream_api_server::MessageSource;

/// Title of every single-send notification.
pub const SINGLE_TITLE: &str = "A new feature is available";

/// Titles a batch send picks from.
pub const TITLES: [&str; 8] = [
    "New content available for IPA",
    "Scheduled maintenance coming",
    "Festival in the city happening",
    "New album released by your most listened to artist",
    "Best driving mode for this route",
    "A feature that has not yet been tested",
    "Your football team will play in the Bundesliga today",
    "There is a recall for your car model",
];

/// Exclusive ceiling of the code on single sends.
pub const SINGLE_CODE_CEILING: u64 = 9_999;
/// Exclusive ceiling of the code on batch sends.
pub const BATCH_CODE_CEILING: u64 = 999_999;

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

pub struct Rng {
    state: u64,
}

impl Rng {
    /// `seed == 0` seeds from the clock.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform-ish value in `0..n`.
    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Generator
// ═══════════════════════════════════════════════════════════════

/// Builds notifications for the send endpoints and commands.
///
/// Every call gets its own RNG. With a non-zero seed the sequence of
/// titles and codes is reproducible across runs; ids are always fresh v4
/// UUIDs.
pub struct NotificationGenerator {
    seed: i64,
    calls: AtomicU64,
}

impl NotificationGenerator {
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            calls: AtomicU64::new(0),
        }
    }

    fn rng(&self) -> Rng {
        if self.seed == 0 {
            return Rng::new(0);
        }
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let mixed = (self.seed as u64) ^ call.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Rng::new(mixed.max(1))
    }
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl MessageSource for NotificationGenerator {
    fn single(&self) -> Message {
        let mut rng = self.rng();
        Message::new(SINGLE_TITLE, fresh_id(), rng.below(SINGLE_CODE_CEILING) as i64)
    }

    fn batch(&self, count: usize) -> Vec<Message> {
        let mut rng = self.rng();
        (0..count)
            .map(|_| {
                let title = TITLES[rng.below(TITLES.len() as u64) as usize];
                Message::new(title, fresh_id(), rng.below(BATCH_CODE_CEILING) as i64)
            })
            .collect()
    }
}
