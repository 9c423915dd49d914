#![no_main]

use boundwit_core::core_bridge::{decode_batch, BatchAck};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_batch(data);
    let _ = BatchAck::from_object(data);
});
