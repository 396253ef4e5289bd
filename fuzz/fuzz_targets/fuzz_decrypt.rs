#![no_main]

use ir_relay::core::message::Status;
use ir_relay::protocol::encoder::{AesEncoder, Encoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Inbound datagrams are attacker controlled: must never panic
    let encoder = AesEncoder::new("fuzz");
    let _ = encoder.decrypt::<Status>(data);
});
