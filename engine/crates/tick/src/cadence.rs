use std::fmt;
use std::time::{Duration, SystemTime};

/// One of the four fixed firing frequencies shared by all time-based
/// game systems. Each cadence runs on its own timer; no phase alignment
/// between cadences is guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cadence {
    Fast,
    Mid,
    Slow,
    Background,
}

impl Cadence {
    pub const ALL: [Cadence; 4] = [
        Cadence::Fast,
        Cadence::Mid,
        Cadence::Slow,
        Cadence::Background,
    ];

    pub fn interval(self) -> Duration {
        match self {
            Cadence::Fast => Duration::from_millis(100),
            Cadence::Mid => Duration::from_secs(1),
            Cadence::Slow => Duration::from_secs(2),
            Cadence::Background => Duration::from_secs(10),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Cadence::Fast => "fast",
            Cadence::Mid => "mid",
            Cadence::Slow => "slow",
            Cadence::Background => "background",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Cadence::Fast => 0,
            Cadence::Mid => 1,
            Cadence::Slow => 2,
            Cadence::Background => 3,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Delivered to every subscriber on each fire of its cadence.
#[derive(Debug, Clone, Copy)]
pub struct TickSignal {
    /// Post-increment fire count; never reset while the process lives.
    pub count: u64,
    /// Wall-clock time of the fire.
    pub timestamp: SystemTime,
}
