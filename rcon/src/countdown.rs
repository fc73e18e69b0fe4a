//! Shutdown countdown scheduling.
//!
//! A countdown runs for a fixed number of ticks. Each tick either broadcasts
//! the remaining time to all players or sends an idle keep-alive so the server
//! does not expire the session. Announcements become more frequent as the
//! countdown nears its end.

use std::time::Duration;

pub const DEFAULT_INTERVAL: u32 = 10;
pub const DEFAULT_ALWAYS_BELOW: u32 = 30;
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Placeholder replaced by the remaining seconds in a message template.
pub const PLACEHOLDER: &str = "{}";

/// What a single countdown tick sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Broadcast(String),
    KeepAlive,
}

/// Parameters of one countdown run.
#[derive(Debug, Clone)]
pub struct Countdown {
    /// Message template; every `{}` is replaced by the remaining seconds.
    pub template: String,
    pub total_seconds: u32,
    /// Announce whenever the remaining seconds are a multiple of this.
    pub interval: u32,
    /// Announce on every tick once fewer seconds than this remain.
    pub always_below: u32,
    /// Pause between ticks.
    pub tick: Duration,
}

impl Countdown {
    pub fn new(template: impl Into<String>, total_seconds: u32) -> Self {
        Self {
            template: template.into(),
            total_seconds,
            interval: DEFAULT_INTERVAL,
            always_below: DEFAULT_ALWAYS_BELOW,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_always_below(mut self, always_below: u32) -> Self {
        self.always_below = always_below;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Seconds left when `tick` starts.
    pub fn remaining(&self, tick: u32) -> u32 {
        self.total_seconds.saturating_sub(tick)
    }

    /// Whether `tick` broadcasts instead of keeping the session alive.
    ///
    /// An interval of zero disables the periodic announcements; the first tick
    /// and the final stretch are still announced.
    pub fn announces(&self, tick: u32) -> bool {
        let remaining = self.remaining(tick);

        tick == 0
            || (self.interval > 0 && remaining % self.interval == 0)
            || remaining < self.always_below
    }

    pub fn message(&self, tick: u32) -> String {
        self.template
            .replace(PLACEHOLDER, &self.remaining(tick).to_string())
    }

    pub fn step(&self, tick: u32) -> Step {
        if self.announces(tick) {
            Step::Broadcast(self.message(tick))
        } else {
            Step::KeepAlive
        }
    }

    /// Every tick's step, in order.
    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        (0..self.total_seconds).map(move |tick| self.step(tick))
    }
}
