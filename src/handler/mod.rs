pub mod participant;
pub mod watcher;

use std::time::{Duration, Instant};

pub const PING_INTERVAL: Duration = Duration::from_secs(5);
/// Three missed pings before the connection counts as gone.
const PONG_GRACE: Duration = Duration::from_secs(15);

/// Pong freshness for one connection. Both handler loops ping every
/// `PING_INTERVAL` and hang up once the grace window passes without a pong.
pub struct Liveness {
    last_pong: Instant,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            last_pong: Instant::now(),
        }
    }

    pub fn pong(&mut self) {
        self.last_pong = Instant::now();
    }

    pub fn expired(&self) -> bool {
        self.last_pong.elapsed() >= PONG_GRACE
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
