//! Liveness bookkeeping for the heartbeat timer.

/// What the runtime should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Send a ping and run a replay.
    Ping,
    /// Too many pings went unanswered. The process should exit.
    Exhausted,
}

/// Counts consecutive heartbeat pings that were never acknowledged.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    threshold: u32,
    missed: u32,
    awaiting_ack: bool,
}

impl HeartbeatMonitor {
    /// `threshold` is the number of consecutive misses tolerated.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            missed: 0,
            awaiting_ack: false,
        }
    }

    pub fn tick(&mut self) -> Verdict {
        if self.awaiting_ack {
            self.missed += 1;
        }
        if self.missed > self.threshold {
            return Verdict::Exhausted;
        }
        self.awaiting_ack = true;
        Verdict::Ping
    }

    pub fn acknowledge(&mut self) {
        self.awaiting_ack = false;
        self.missed = 0;
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }
}
