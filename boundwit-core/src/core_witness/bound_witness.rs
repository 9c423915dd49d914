//! Bound witness record
//!
//! A record is one container object with three positional components:
//!
//! ```text
//! BOUND_WITNESS
//! ├── [0] KEY_SET        one public key object per party
//! ├── [1] PAYLOAD_SET    one payload entry per party
//! │       └── PAYLOAD    [0] signed portion, [1..] unsigned metadata
//! └── [2] SIGNATURE_SET  one signature object per party
//! ```
//!
//! Both constructors end up with the same representation: the encoded bytes
//! in a shared buffer plus the byte ranges of each component, located once
//! when the record is built. Accessors hand out slices of that buffer.
//!
//! Every party signs the same preimage:
//!
//! ```text
//! [KEY_SET bytes][signed portion 0][signed portion 1]...[signed portion N-1]
//! ```

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::core_codec::{encode_untyped, schemas, CodecError, CodecResult, ObjectRef};
use crate::core_crypto::{
    HashProvider, HashValue, ProviderResult, PublicKey, Signature, SignatureVerifier, Signer,
};
use crate::error::{WitnessError, WitnessResult};

/// Byte ranges of a record's components inside its buffer
#[derive(Debug)]
struct Layout {
    key_set: Range<usize>,
    payload_set: Range<usize>,
    signature_set: Range<usize>,
    signed_portions: Vec<Range<usize>>,
    key_count: usize,
    signature_count: usize,
}

impl Layout {
    fn locate(buf: &[u8]) -> CodecResult<Self> {
        let root = ObjectRef::parse(buf)?.expect_schema(schemas::BOUND_WITNESS)?;
        let components = root.children()?.collect::<CodecResult<Vec<_>>>()?;
        let [key_set, payload_set, signature_set] = components.as_slice() else {
            return Err(CodecError::UnexpectedItemCount {
                expected: 3,
                actual: components.len(),
            });
        };

        let mut signed_portions = Vec::new();
        for entry in payload_set.children()? {
            signed_portions.push(entry?.child(0)?.range());
        }

        Ok(Self {
            key_set: key_set.range(),
            payload_set: payload_set.range(),
            signature_set: signature_set.range(),
            signed_portions,
            key_count: key_set.count()?,
            signature_count: signature_set.count()?,
        })
    }
}

/// An immutable multi-party attestation record
///
/// Cloning is cheap: the buffer and layout are shared.
#[derive(Clone)]
pub struct BoundWitness {
    bytes: Arc<[u8]>,
    layout: Arc<Layout>,
}

impl BoundWitness {
    /// Wrap previously encoded bytes, locating the three components in place
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> CodecResult<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let layout = Layout::locate(&bytes)?;
        trace!(
            len = bytes.len(),
            keys = layout.key_count,
            payloads = layout.signed_portions.len(),
            signatures = layout.signature_count,
            "Decoded bound witness"
        );
        Ok(Self {
            bytes,
            layout: Arc::new(layout),
        })
    }

    /// Build a record from already-encoded component sets
    pub fn new(key_set: &[u8], payload_set: &[u8], signature_set: &[u8]) -> CodecResult<Self> {
        Self::from_bytes(encode_untyped(
            schemas::BOUND_WITNESS,
            [key_set, payload_set, signature_set],
        ))
    }

    /// Build a record from individual key, payload and signature objects
    pub fn assemble<K, P, S>(public_keys: &[K], payloads: &[P], signatures: &[S]) -> CodecResult<Self>
    where
        K: AsRef<[u8]>,
        P: AsRef<[u8]>,
        S: AsRef<[u8]>,
    {
        Self::new(
            &encode_untyped(schemas::KEY_SET, public_keys),
            &encode_untyped(schemas::PAYLOAD_SET, payloads),
            &encode_untyped(schemas::SIGNATURE_SET, signatures),
        )
    }

    /// Record with no parties yet
    pub fn empty() -> CodecResult<Self> {
        Self::assemble::<Vec<u8>, Vec<u8>, Vec<u8>>(&[], &[], &[])
    }

    /// Full encoding of the record
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded Public Key Set
    pub fn public_keys(&self) -> &[u8] {
        &self.bytes[self.layout.key_set.clone()]
    }

    /// Encoded Payload Set
    pub fn payloads(&self) -> &[u8] {
        &self.bytes[self.layout.payload_set.clone()]
    }

    /// Encoded Signature Set
    pub fn signatures(&self) -> &[u8] {
        &self.bytes[self.layout.signature_set.clone()]
    }

    pub fn key_count(&self) -> usize {
        self.layout.key_count
    }

    pub fn payload_count(&self) -> usize {
        self.layout.signed_portions.len()
    }

    pub fn signature_count(&self) -> usize {
        self.layout.signature_count
    }

    /// Number of parties, or `None` when the component sets disagree
    pub fn party_count(&self) -> Option<usize> {
        let keys = self.key_count();
        if keys == self.payload_count() && keys == self.signature_count() {
            Some(keys)
        } else {
            None
        }
    }

    /// Equal, nonzero component lengths
    pub fn is_complete(&self) -> bool {
        matches!(self.party_count(), Some(n) if n > 0)
    }

    /// Signed portion of the payload at `index`
    pub fn signed_portion(&self, index: usize) -> Option<&[u8]> {
        self.layout
            .signed_portions
            .get(index)
            .map(|range| &self.bytes[range.clone()])
    }

    /// Bytes every party signs
    pub fn signing_preimage(&self) -> Vec<u8> {
        let size = self.layout.key_set.len()
            + self
                .layout
                .signed_portions
                .iter()
                .map(|range| range.len())
                .sum::<usize>();

        let mut preimage = Vec::with_capacity(size);
        preimage.extend_from_slice(self.public_keys());
        for range in &self.layout.signed_portions {
            preimage.extend_from_slice(&self.bytes[range.clone()]);
        }
        preimage
    }

    /// Hash the signing preimage
    pub async fn compute_hash<H>(&self, provider: &H) -> ProviderResult<HashValue>
    where
        H: HashProvider + ?Sized,
    {
        provider.create_hash(&self.signing_preimage()).await
    }

    /// Sign the signing preimage
    pub async fn sign<S>(&self, signer: &S) -> ProviderResult<Signature>
    where
        S: Signer + ?Sized,
    {
        signer.sign_data(&self.signing_preimage()).await
    }

    /// Public key of the party at `index`
    pub fn public_key(&self, index: usize) -> CodecResult<PublicKey> {
        let item = ObjectRef::parse(self.public_keys())?.item(index)?;
        PublicKey::from_object(&item)
    }

    /// Signature of the party at `index`
    pub fn signature(&self, index: usize) -> CodecResult<Signature> {
        let item = ObjectRef::parse(self.signatures())?.item(index)?;
        Signature::from_object(&item)
    }

    /// Append a party's public key and payload entry; signatures are untouched
    pub fn with_contribution(&self, public_key: &PublicKey, payload: &[u8]) -> CodecResult<Self> {
        let mut keys = set_items(self.public_keys())?;
        keys.push(public_key.to_object());

        let mut payloads = set_items(self.payloads())?;
        payloads.push(payload.to_vec());

        let signatures = set_items(self.signatures())?;
        Self::assemble(&keys, &payloads, &signatures)
    }

    /// Append a signature to the Signature Set
    pub fn with_signature(&self, signature: &Signature) -> CodecResult<Self> {
        let keys = set_items(self.public_keys())?;
        let payloads = set_items(self.payloads())?;
        let mut signatures = set_items(self.signatures())?;
        signatures.push(signature.to_object());
        Self::assemble(&keys, &payloads, &signatures)
    }

    /// Check every party's signature over the signing preimage
    pub fn verify_signatures<V>(&self, verifier: &V) -> WitnessResult<()>
    where
        V: SignatureVerifier + ?Sized,
    {
        if !self.is_complete() {
            return Err(self.inconsistent());
        }

        let preimage = self.signing_preimage();
        let keys = set_items(self.public_keys())?;
        let signatures = set_items(self.signatures())?;

        for (index, (key, signature)) in keys.iter().zip(&signatures).enumerate() {
            let key = PublicKey::from_object(key)?;
            let signature = Signature::from_object(signature)?;
            verifier
                .verify(&key, &preimage, &signature)
                .map_err(|source| WitnessError::InvalidPartySignature { index, source })?;
        }
        Ok(())
    }

    pub(crate) fn inconsistent(&self) -> WitnessError {
        WitnessError::InconsistentRecord {
            keys: self.key_count(),
            payloads: self.payload_count(),
            signatures: self.signature_count(),
        }
    }
}

/// Items of an encoded component set, as complete objects
fn set_items(set: &[u8]) -> CodecResult<Vec<Vec<u8>>> {
    ObjectRef::parse(set)?
        .items()?
        .map(|item| item.map(Cow::into_owned))
        .collect()
}

impl PartialEq for BoundWitness {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for BoundWitness {}

impl Hash for BoundWitness {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Debug for BoundWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 16;
        let preview = &self.bytes[..self.bytes.len().min(PREVIEW)];
        f.debug_struct("BoundWitness")
            .field("len", &self.bytes.len())
            .field("keys", &self.key_count())
            .field("payloads", &self.payload_count())
            .field("signatures", &self.signature_count())
            .field("head", &hex::encode(preview))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_codec::{encode, ObjectSchema};
    use crate::core_crypto::{Ed25519Signer, Ed25519Verifier, ProviderError, Sha256Hasher};
    use crate::core_witness::Payload;
    use sha2::{Digest, Sha256};

    const ITEM: ObjectSchema = ObjectSchema::value(0x20);

    fn key(n: u8) -> Vec<u8> {
        encode(schemas::ED25519_PUBLIC_KEY, &[n; 32])
    }

    fn sig(n: u8) -> Vec<u8> {
        encode(schemas::ED25519_SIGNATURE, &[n; 64])
    }

    fn payload(signed: &[u8], unsigned: &[u8]) -> Vec<u8> {
        encode_untyped(schemas::PAYLOAD, [encode(ITEM, signed), encode(ITEM, unsigned)])
    }

    fn record(keys: usize, payloads: usize, signatures: usize) -> BoundWitness {
        let k: Vec<_> = (0..keys).map(|i| key(i as u8)).collect();
        let p: Vec<_> = (0..payloads).map(|i| payload(&[i as u8], &[0xEE])).collect();
        let s: Vec<_> = (0..signatures).map(|i| sig(i as u8)).collect();
        BoundWitness::assemble(&k, &p, &s).unwrap()
    }

    #[test]
    fn test_complete_with_equal_nonzero_sets() {
        for n in 1..=4 {
            let bw = record(n, n, n);
            assert!(bw.is_complete());
            assert_eq!(bw.party_count(), Some(n));
        }
    }

    #[test]
    fn test_zero_parties_not_complete() {
        let bw = BoundWitness::empty().unwrap();
        assert_eq!(bw.party_count(), Some(0));
        assert!(!bw.is_complete());
    }

    #[test]
    fn test_mismatched_sets_are_inconsistent() {
        let bw = record(2, 2, 1);
        assert_eq!(bw.party_count(), None);
        assert!(!bw.is_complete());

        let bw = record(1, 2, 2);
        assert_eq!(bw.party_count(), None);
    }

    #[test]
    fn test_preimage_is_deterministic() {
        let bw = record(3, 3, 3);
        assert_eq!(bw.signing_preimage(), bw.signing_preimage());

        let copy = BoundWitness::from_bytes(bw.as_bytes().to_vec()).unwrap();
        assert_eq!(copy.signing_preimage(), bw.signing_preimage());
    }

    #[test]
    fn test_preimage_layout() {
        let bw = record(2, 2, 0);
        let preimage = bw.signing_preimage();

        let mut expected = bw.public_keys().to_vec();
        expected.extend_from_slice(&encode(ITEM, &[0]));
        expected.extend_from_slice(&encode(ITEM, &[1]));
        assert_eq!(preimage, expected);
    }

    #[test]
    fn test_preimage_excludes_unsigned_metadata() {
        let p = payload(&[0xAA], &[0xBB]);
        let bw = BoundWitness::assemble(&[key(1)], &[p], &[sig(1)]).unwrap();

        let preimage = bw.signing_preimage();
        let tail = &preimage[bw.public_keys().len()..];
        assert_eq!(tail, encode(ITEM, &[0xAA]).as_slice());
        assert!(tail.contains(&0xAA));
        assert!(!tail.contains(&0xBB));
        assert!(!preimage.contains(&0xBB));
    }

    #[test]
    fn test_signed_portion_is_first_payload_element() {
        let entry = Payload::new()
            .with_signed(encode(ITEM, &[1]))
            .with_unsigned(encode(ITEM, &[2]))
            .to_object();
        let bw = BoundWitness::assemble(&[key(1)], &[entry], &[sig(1)]).unwrap();

        let signed = bw.signed_portion(0).unwrap();
        assert_eq!(
            signed,
            encode_untyped(schemas::SIGNED_PAYLOAD, [encode(ITEM, &[1])]).as_slice()
        );
        assert!(bw.signed_portion(1).is_none());
    }

    #[test]
    fn test_from_bytes_slices_original_ranges() {
        let k = encode_untyped(schemas::KEY_SET, [key(1), key(2)]);
        let p = encode_untyped(schemas::PAYLOAD_SET, [payload(&[1], &[2]), payload(&[3], &[4])]);
        let s = encode_untyped(schemas::SIGNATURE_SET, [sig(1), sig(2)]);
        let encoded = encode_untyped(schemas::BOUND_WITNESS, [&k, &p, &s]);

        let bw = BoundWitness::from_bytes(encoded.clone()).unwrap();
        assert_eq!(bw.as_bytes(), encoded.as_slice());
        assert_eq!(bw.public_keys(), k.as_slice());
        assert_eq!(bw.payloads(), p.as_slice());
        assert_eq!(bw.signatures(), s.as_slice());

        let header = encoded.len() - k.len() - p.len() - s.len();
        assert_eq!(&encoded[header..header + k.len()], bw.public_keys());
        assert_eq!(bw.party_count(), Some(2));
    }

    #[test]
    fn test_both_constructors_agree() {
        let k = encode_untyped(schemas::KEY_SET, [key(9)]);
        let p = encode_untyped(schemas::PAYLOAD_SET, [payload(&[1], &[2])]);
        let s = encode_untyped(schemas::SIGNATURE_SET, [sig(9)]);

        let assembled = BoundWitness::new(&k, &p, &s).unwrap();
        let decoded = BoundWitness::from_bytes(assembled.as_bytes()).unwrap();
        assert_eq!(assembled, decoded);
        assert_eq!(assembled.public_keys(), decoded.public_keys());
        assert_eq!(assembled.signing_preimage(), decoded.signing_preimage());
    }

    #[test]
    fn test_rejects_wrong_container_schema() {
        let bytes = encode_untyped(ObjectSchema::untyped_iterable(0x55), [
            encode_untyped(schemas::KEY_SET, Vec::<Vec<u8>>::new()),
        ]);
        assert_eq!(
            BoundWitness::from_bytes(bytes).unwrap_err(),
            CodecError::UnexpectedSchema {
                expected: 0x01,
                actual: 0x55
            }
        );
    }

    #[test]
    fn test_rejects_wrong_component_count() {
        let empty = encode_untyped(schemas::KEY_SET, Vec::<Vec<u8>>::new());
        let bytes = encode_untyped(schemas::BOUND_WITNESS, [&empty, &empty]);
        assert_eq!(
            BoundWitness::from_bytes(bytes).unwrap_err(),
            CodecError::UnexpectedItemCount {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_rejects_payload_without_signed_portion() {
        let empty_payload = encode_untyped(schemas::PAYLOAD, Vec::<Vec<u8>>::new());
        let result = BoundWitness::assemble(&[key(1)], &[empty_payload], &[sig(1)]);
        assert_eq!(
            result.unwrap_err(),
            CodecError::IndexOutOfRange { index: 0, len: 0 }
        );
    }

    #[test]
    fn test_rejects_truncated_bytes() {
        let bw = record(1, 1, 1);
        let truncated = &bw.as_bytes()[..bw.as_bytes().len() - 3];
        assert!(BoundWitness::from_bytes(truncated).is_err());
    }

    #[tokio::test]
    async fn test_compute_hash_covers_preimage() {
        let bw = record(2, 2, 2);
        let hash = bw.compute_hash(&Sha256Hasher).await.unwrap();
        assert_eq!(hash.as_bytes(), Sha256::digest(bw.signing_preimage()).as_slice());
    }

    #[tokio::test]
    async fn test_signatures_from_all_parties_verify() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let bob = Ed25519Signer::from_seed(&[2; 32]);

        let bw = BoundWitness::empty()
            .unwrap()
            .with_contribution(&alice.public_key(), &payload(&[1], &[]))
            .unwrap()
            .with_contribution(&bob.public_key(), &payload(&[2], &[]))
            .unwrap();

        let sig_a = bw.sign(&alice).await.unwrap();
        let sig_b = bw.sign(&bob).await.unwrap();
        let bw = bw.with_signature(&sig_a).unwrap().with_signature(&sig_b).unwrap();

        assert!(bw.is_complete());
        bw.verify_signatures(&Ed25519Verifier).unwrap();
        assert_eq!(bw.public_key(1).unwrap(), bob.public_key());
        assert_eq!(bw.signature(0).unwrap(), sig_a);
    }

    #[tokio::test]
    async fn test_swapped_signatures_fail_verification() {
        let alice = Ed25519Signer::from_seed(&[1; 32]);
        let bob = Ed25519Signer::from_seed(&[2; 32]);

        let bw = BoundWitness::empty()
            .unwrap()
            .with_contribution(&alice.public_key(), &payload(&[1], &[]))
            .unwrap()
            .with_contribution(&bob.public_key(), &payload(&[2], &[]))
            .unwrap();

        let sig_a = bw.sign(&alice).await.unwrap();
        let sig_b = bw.sign(&bob).await.unwrap();
        let swapped = bw.with_signature(&sig_b).unwrap().with_signature(&sig_a).unwrap();

        let err = swapped.verify_signatures(&Ed25519Verifier).unwrap_err();
        assert!(matches!(
            err,
            WitnessError::InvalidPartySignature {
                index: 0,
                source: ProviderError::InvalidSignature
            }
        ));
    }

    #[test]
    fn test_verify_rejects_incomplete_record() {
        let bw = record(2, 2, 1);
        assert!(matches!(
            bw.verify_signatures(&Ed25519Verifier),
            Err(WitnessError::InconsistentRecord { signatures: 1, .. })
        ));
    }
}
