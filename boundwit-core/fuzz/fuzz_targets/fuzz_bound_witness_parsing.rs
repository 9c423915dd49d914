#![no_main]

use boundwit_core::core_crypto::Ed25519Verifier;
use boundwit_core::core_witness::BoundWitness;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Records arrive from untrusted peers; decoding and every accessor must
    // fail cleanly on malformed input
    if let Ok(record) = BoundWitness::from_bytes(data.to_vec()) {
        let _ = record.signing_preimage();
        for index in 0..record.key_count() {
            let _ = record.public_key(index);
        }
        let _ = record.verify_signatures(&Ed25519Verifier);
    }
});
