//! Transform Pipeline
//!
//! Symmetric encode/decode applied to values on their way into and out of
//! the store. Encode compresses then obfuscates; decode strips obfuscation
//! then decompresses, so an obfuscated blob is never decompressible on its own.

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TransformError;

/// Passphrase used when the configuration does not supply one.
const BUILTIN_PASSPHRASE: &str = "offline-cache/at-rest/v1";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

// == Transform Flags ==
/// Which transforms to apply on encode, or which were applied on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformFlags {
    pub compress: bool,
    pub encrypt: bool,
}

// == Obfuscator ==
/// Keyed at-rest obfuscation for cached payloads.
///
/// A SHA-256 counter-mode keystream is XORed over the data under a random
/// nonce, and a truncated SHA-256 tag detects corruption. This hides cached
/// values from casual inspection of the storage medium. It is NOT a security
/// boundary: the key usually lives in the same process or a built-in
/// constant, and the construction has not been reviewed as a cipher.
#[derive(Clone)]
pub struct Obfuscator {
    key: [u8; 32],
}

impl std::fmt::Debug for Obfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Obfuscator").finish_non_exhaustive()
    }
}

impl Obfuscator {
    /// Derives the key from `passphrase`, or from the built-in one.
    pub fn new(passphrase: Option<&str>) -> Self {
        let passphrase = passphrase.unwrap_or(BUILTIN_PASSPHRASE);
        Self {
            key: Sha256::digest(passphrase.as_bytes()).into(),
        }
    }

    /// Output layout: `nonce || tag || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut ciphertext = plaintext.to_vec();
        self.apply_keystream(&nonce, &mut ciphertext);
        let tag = self.tag(&nonce, &ciphertext);

        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&tag);
        out.extend_from_slice(&ciphertext);
        out
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, TransformError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(TransformError::Decrypt(format!(
                "payload of {} bytes is shorter than the {} byte header",
                sealed.len(),
                NONCE_LEN + TAG_LEN
            )));
        }

        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        if self.tag(nonce, ciphertext).as_slice() != tag {
            return Err(TransformError::Decrypt("integrity tag mismatch".to_string()));
        }

        let mut plaintext = ciphertext.to_vec();
        self.apply_keystream(nonce, &mut plaintext);
        Ok(plaintext)
    }

    fn apply_keystream(&self, nonce: &[u8], data: &mut [u8]) {
        for (counter, chunk) in data.chunks_mut(32).enumerate() {
            let block = Sha256::new()
                .chain_update(self.key)
                .chain_update(nonce)
                .chain_update((counter as u64).to_be_bytes())
                .finalize();
            for (byte, k) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= k;
            }
        }
    }

    fn tag(&self, nonce: &[u8], ciphertext: &[u8]) -> [u8; TAG_LEN] {
        let digest = Sha256::new()
            .chain_update(b"tag")
            .chain_update(self.key)
            .chain_update(nonce)
            .chain_update(ciphertext)
            .finalize();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest[..TAG_LEN]);
        tag
    }
}

impl Default for Obfuscator {
    fn default() -> Self {
        Self::new(None)
    }
}

// == Serialize / Deserialize ==
/// Converts a logical value into the JSON bytes the pipeline operates on.
pub fn serialize<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, TransformError> {
    serde_json::to_vec(value).map_err(TransformError::Serialize)
}

/// Converts decoded JSON bytes back into a logical value.
pub fn deserialize<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, TransformError> {
    serde_json::from_slice(bytes).map_err(TransformError::Deserialize)
}

// == Encode ==
/// Applies compression, then obfuscation, as requested by `flags`.
pub fn encode(
    bytes: Vec<u8>,
    flags: TransformFlags,
    obfuscator: &Obfuscator,
) -> Result<Vec<u8>, TransformError> {
    let mut payload = bytes;

    if flags.compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).map_err(TransformError::Compress)?;
        payload = encoder.finish().map_err(TransformError::Compress)?;
    }

    if flags.encrypt {
        payload = obfuscator.seal(&payload);
    }

    Ok(payload)
}

// == Decode ==
/// Exact inverse of [`encode`]: strips obfuscation, then decompresses.
pub fn decode(
    payload: &[u8],
    flags: TransformFlags,
    obfuscator: &Obfuscator,
) -> Result<Vec<u8>, TransformError> {
    let mut bytes = if flags.encrypt {
        obfuscator.open(payload)?
    } else {
        payload.to_vec()
    };

    if flags.compress {
        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(TransformError::Decompress)?;
        bytes = out;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL_FLAGS: [TransformFlags; 4] = [
        TransformFlags { compress: false, encrypt: false },
        TransformFlags { compress: true, encrypt: false },
        TransformFlags { compress: false, encrypt: true },
        TransformFlags { compress: true, encrypt: true },
    ];

    #[test]
    fn test_roundtrip_all_flag_combinations() {
        let obfuscator = Obfuscator::default();
        let value = json!({"name": "A", "tags": ["x", "y"], "n": 42});

        for flags in ALL_FLAGS {
            let payload = encode(serialize(&value).unwrap(), flags, &obfuscator).unwrap();
            let decoded = decode(&payload, flags, &obfuscator).unwrap();
            let back: serde_json::Value = deserialize(&decoded).unwrap();
            assert_eq!(back, value, "flags {:?}", flags);
        }
    }

    #[test]
    fn test_plain_encode_is_json() {
        let payload = encode(
            serialize("hello").unwrap(),
            TransformFlags::default(),
            &Obfuscator::default(),
        )
        .unwrap();
        assert_eq!(payload, b"\"hello\"");
    }

    #[test]
    fn test_compression_shrinks_repetitive_values() {
        let value = "a".repeat(4096);
        let flags = TransformFlags { compress: true, encrypt: false };

        let payload = encode(serialize(&value).unwrap(), flags, &Obfuscator::default()).unwrap();
        assert!(payload.len() < 200);
    }

    #[test]
    fn test_encrypted_payload_hides_plaintext() {
        let flags = TransformFlags { compress: false, encrypt: true };
        let payload = encode(
            serialize("secret-value").unwrap(),
            flags,
            &Obfuscator::default(),
        )
        .unwrap();

        let haystack = String::from_utf8_lossy(&payload);
        assert!(!haystack.contains("secret-value"));
    }

    #[test]
    fn test_encrypted_compressed_blob_is_not_directly_decompressible() {
        let obfuscator = Obfuscator::default();
        let both = TransformFlags { compress: true, encrypt: true };
        let compress_only = TransformFlags { compress: true, encrypt: false };

        let payload = encode(serialize("value").unwrap(), both, &obfuscator).unwrap();
        assert!(decode(&payload, compress_only, &obfuscator).is_err());
    }

    #[test]
    fn test_wrong_key_fails_to_open() {
        let flags = TransformFlags { compress: false, encrypt: true };
        let payload = encode(serialize(&1).unwrap(), flags, &Obfuscator::new(Some("one"))).unwrap();

        let result = decode(&payload, flags, &Obfuscator::new(Some("two")));
        assert!(matches!(result, Err(TransformError::Decrypt(_))));
    }

    #[test]
    fn test_tampered_payload_is_detected() {
        let obfuscator = Obfuscator::default();
        let mut sealed = obfuscator.seal(b"payload");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert!(matches!(obfuscator.open(&sealed), Err(TransformError::Decrypt(_))));
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let result = Obfuscator::default().open(&[1, 2, 3]);
        assert!(matches!(result, Err(TransformError::Decrypt(_))));
    }

    #[test]
    fn test_garbage_fails_decompression() {
        let flags = TransformFlags { compress: true, encrypt: false };
        let result = decode(b"not gzip", flags, &Obfuscator::default());
        assert!(matches!(result, Err(TransformError::Decompress(_))));
    }

    #[test]
    fn test_type_mismatch_fails_deserialize() {
        let result: Result<u32, _> = deserialize(b"\"text\"");
        assert!(matches!(result, Err(TransformError::Deserialize(_))));
    }
}
