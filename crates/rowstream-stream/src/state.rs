//! Stream lifecycle states.

use std::fmt;

/// `Unopened → Open → {Exhausted | Failed} → Closed`.
///
/// `Closed` is also reachable directly from `Unopened` and `Open` through an
/// explicit close. Only `Open` holds store resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Unopened,
    Open,
    /// The store reported end of result set; resources are released.
    Exhausted,
    /// Open or a fetch failed; resources are released.
    Failed,
    Closed,
}

impl StreamState {
    pub fn is_open(&self) -> bool {
        matches!(self, StreamState::Open)
    }

    /// No further items will be produced.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Exhausted | StreamState::Failed | StreamState::Closed
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Unopened => "unopened",
            StreamState::Open => "open",
            StreamState::Exhausted => "exhausted",
            StreamState::Failed => "failed",
            StreamState::Closed => "closed",
        };
        f.write_str(s)
    }
}
