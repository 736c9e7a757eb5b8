//! LAN discovery announcement datagram.
//!
//! ```text
//! [Magic "APLG"(4)] [Game port(2, LE)] [Server name(32, NUL padded)]
//! ```
//!
//! Clients listen on the discovery port, check the magic and take the sender
//! address plus the advertised port as the server to connect to. The name is
//! read by C clients as a C string, so at most 31 bytes of it are sent.

use crate::config::{ANNOUNCEMENT_SIZE, DISCOVERY_MAGIC, SERVER_NAME_FIELD};
use crate::error::{constants, RelayError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub game_port: u16,
    pub server_name: String,
}

impl Announcement {
    pub fn new(game_port: u16, server_name: impl Into<String>) -> Self {
        Self {
            game_port,
            server_name: server_name.into(),
        }
    }

    /// Encode to the fixed 38-byte layout, truncating the name on a
    /// character boundary if it does not fit.
    pub fn to_bytes(&self) -> [u8; ANNOUNCEMENT_SIZE] {
        let mut out = [0u8; ANNOUNCEMENT_SIZE];
        out[0..4].copy_from_slice(&DISCOVERY_MAGIC);
        out[4..6].copy_from_slice(&self.game_port.to_le_bytes());

        let name = truncate_on_char_boundary(&self.server_name, SERVER_NAME_FIELD - 1);
        out[6..6 + name.len()].copy_from_slice(name.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ANNOUNCEMENT_SIZE {
            return Err(RelayError::InvalidAnnouncement(constants::ERR_BAD_LENGTH));
        }
        if bytes[0..4] != DISCOVERY_MAGIC {
            return Err(RelayError::InvalidAnnouncement(constants::ERR_BAD_MAGIC));
        }

        let game_port = u16::from_le_bytes([bytes[4], bytes[5]]);
        let name_field = &bytes[6..];
        let end = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_field.len());
        let server_name = String::from_utf8_lossy(&name_field[..end]).into_owned();

        Ok(Self {
            game_port,
            server_name,
        })
    }
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
