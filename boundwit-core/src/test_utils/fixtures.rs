//! Record and signer fixtures
//!
//! Everything here is deterministic: signers come from fixed seeds and
//! payload bytes from a seeded RNG, so the same call always yields the same
//! encoded record.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core_codec::{encode, ObjectSchema};
use crate::core_crypto::{
    Ed25519Signer, ProviderError, ProviderResult, PublicKey, Signature, Signer,
};
use crate::core_witness::{BoundWitness, Party, Payload};

/// Schema of the signed item in fixture payloads
pub const FIXTURE_ITEM: ObjectSchema = ObjectSchema::value(0x20);
/// Schema of the unsigned item in fixture payloads
pub const FIXTURE_METADATA: ObjectSchema = ObjectSchema::value(0x21);

/// Ed25519 signer whose key depends only on `seed`
pub fn party_signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed(&[seed; 32])
}

/// Reproducible pseudo-random bytes
pub fn deterministic_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random()).collect()
}

/// Payload whose signed item carries `n` and whose metadata is seeded by `n`
pub fn payload_for(n: u32) -> Payload {
    Payload::new()
        .with_signed(encode(FIXTURE_ITEM, &n.to_be_bytes()))
        .with_unsigned(encode(FIXTURE_METADATA, &deterministic_bytes(8, u64::from(n))))
}

/// One contribution, no signature; distinct for every `n`
pub fn numbered_record(n: u32) -> BoundWitness {
    BoundWitness::empty()
        .and_then(|record| record.with_contribution(&party_signer(0xEE).public_key(), &payload_for(n).to_object()))
        .expect("fixture record encodes")
}

/// Complete single-party record signed by `signer`
pub async fn single_party_record<S>(signer: &S) -> BoundWitness
where
    S: Signer + ?Sized,
{
    let record = BoundWitness::empty()
        .and_then(|record| record.with_contribution(&signer.public_key(), &payload_for(0).to_object()))
        .expect("fixture record encodes");
    record.sign_and_fold(signer).await.expect("fixture record signs")
}

/// Complete record with `parties` Ed25519 parties; `variant` changes the payloads
pub async fn signed_record(parties: u8, variant: u8) -> BoundWitness {
    let parties: Vec<_> = (1..=parties)
        .map(|i| {
            let n = u32::from_be_bytes([0, 0, variant, i]);
            Party::new(party_signer(i), payload_for(n))
        })
        .collect();
    crate::core_witness::witness_locally(&parties)
        .await
        .expect("fixture parties witness")
}

/// Signer that owns a key but always fails to sign
#[derive(Debug, Clone)]
pub struct FailingSigner {
    public_key: PublicKey,
}

impl FailingSigner {
    pub fn new(public_key: PublicKey) -> Self {
        Self { public_key }
    }
}

#[async_trait]
impl Signer for FailingSigner {
    fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    async fn sign_data(&self, _data: &[u8]) -> ProviderResult<Signature> {
        Err(ProviderError::Unavailable("signing key is offline".to_string()))
    }
}
