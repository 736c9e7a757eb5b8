#![no_main]

use game_relay::Announcement;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz discovery datagram parsing
    if let Ok(announcement) = Announcement::from_bytes(data) {
        // A parsed announcement must re-encode to the fixed layout
        let encoded = announcement.to_bytes();
        let _ = Announcement::from_bytes(&encoded);
    }
});
