#![no_main]

use ir_relay::core::nec::{NecCommand, NecTiming};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let signal: Vec<u32> = data
        .chunks_exact(2)
        .map(|pair| u32::from(u16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    if let Ok(command) = NecCommand::decode(&signal, &NecTiming::default()) {
        // anything that decodes must survive a re-encode
        let again = NecCommand::decode(&command.encode(&NecTiming::default()), &NecTiming::default());
        assert_eq!(again.ok(), Some(command));
    }
});
