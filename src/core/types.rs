//! Identifier types shared by the protocol helpers and the session services.

use std::fmt;

/// Server-assigned session id. Starts at 1, increases for the lifetime of the
/// process and is never handed out twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl SessionId {
    /// First id the registry hands out
    pub const FIRST: SessionId = SessionId(1);

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<SessionId> for u32 {
    fn from(id: SessionId) -> u32 {
        id.0
    }
}
