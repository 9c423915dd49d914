//! Local party contribution
//!
//! A bound witness is built in two phases. First every party appends its
//! public key and payload; then, in key order, every party signs the shared
//! preimage and folds its signature in. Adding a key after the first
//! signature would change the preimage, so contributions are refused once
//! signing has started.

use metrics::counter;
use tracing::debug;

use super::bound_witness::BoundWitness;
use super::payload::Payload;
use crate::core_crypto::{PublicKey, Signer};
use crate::error::{WitnessError, WitnessResult};
use crate::metrics::{Timer, WITNESS_SIGNATURES_FOLDED, WITNESS_SIGNING_MS};

impl BoundWitness {
    /// Slot of the next party expected to sign, if the record awaits one
    pub fn pending_signer(&self) -> Option<usize> {
        let keys = self.key_count();
        let signatures = self.signature_count();
        (keys > 0 && keys == self.payload_count() && signatures < keys).then_some(signatures)
    }

    /// Sign the preimage with `signer` and return the record with the
    /// signature appended
    ///
    /// The record must be awaiting a signature and the signer's key must be
    /// the one at the pending slot. On failure `self` is unchanged.
    pub async fn sign_and_fold<S>(&self, signer: &S) -> WitnessResult<BoundWitness>
    where
        S: Signer + ?Sized,
    {
        let slot = self.pending_signer().ok_or_else(|| self.inconsistent())?;
        if self.public_key(slot)? != signer.public_key() {
            return Err(WitnessError::UnexpectedSigner { index: slot });
        }

        let timer = Timer::new(WITNESS_SIGNING_MS);
        let signature = self.sign(signer).await?;
        let signing_ms = timer.stop();

        let folded = self.with_signature(&signature)?;
        counter!(WITNESS_SIGNATURES_FOLDED).increment(1);
        debug!(
            slot,
            signing_ms,
            parties = self.key_count(),
            complete = folded.is_complete(),
            "Folded signature into bound witness"
        );
        Ok(folded)
    }
}

/// A participant: its signer plus the payload it attests to
pub struct Party<S> {
    signer: S,
    payload: Payload,
}

impl<S: Signer> Party<S> {
    pub fn new(signer: S, payload: Payload) -> Self {
        Self { signer, payload }
    }

    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Append this party's key and payload
    pub fn contribute(&self, record: &BoundWitness) -> WitnessResult<BoundWitness> {
        if record.signature_count() != 0 || record.key_count() != record.payload_count() {
            return Err(record.inconsistent());
        }
        Ok(record.with_contribution(&self.signer.public_key(), &self.payload.to_object())?)
    }

    /// Sign the record at this party's slot
    pub async fn sign(&self, record: &BoundWitness) -> WitnessResult<BoundWitness> {
        record.sign_and_fold(&self.signer).await
    }
}

/// Run both phases for parties that are all local to this process
pub async fn witness_locally<S: Signer>(parties: &[Party<S>]) -> WitnessResult<BoundWitness> {
    let mut record = BoundWitness::empty()?;
    for party in parties {
        record = party.contribute(&record)?;
    }
    for party in parties {
        record = party.sign(&record).await?;
    }
    Ok(record)
}
