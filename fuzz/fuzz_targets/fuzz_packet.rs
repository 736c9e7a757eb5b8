#![no_main]

use libfuzzer_sys::fuzz_target;
use game_relay::Packet;

fuzz_target!(|data: &[u8]| {
    // Fuzz packet parsing - test for panics, crashes, infinite loops
    let _ = Packet::from_bytes(data);
});
