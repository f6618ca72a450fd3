//! License key derivation and surface-format validation.
//!
//! Keys are derived in stages:
//!
//! - a JSON payload carrying a fresh random nonce, the issuance timestamp,
//!   the optional owner and license-type references, and a 16-character
//!   uppercase-alphanumeric seed
//! - HMAC-SHA256 over the base64url-encoded payload bytes, keyed with the
//!   codec secret, forming the signed token `payload.signature`
//! - SHA-256 of the signed token, re-encoded as unpadded uppercase base-32
//!   and truncated to 25 characters
//! - an optional prefix, then the whole string regrouped into dash-joined
//!   blocks of five characters
//!
//! Only the hash survives into the final string, but the signature step
//! still binds every key to the secret: two codecs with different secrets
//! derive disjoint key spaces. Determinism is not a goal; the nonce and
//! timestamp make repeated calls with identical inputs produce different
//! keys.

use crate::ids::LicenseTypeId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Alphabet shared by key bodies, seeds, and prefixes.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Base-32 characters kept from the token digest.
const KEY_BODY_LEN: usize = 25;

/// Size of the dash-joined display groups.
const GROUP_LEN: usize = 5;

/// Length of the random seed inside the payload.
const SEED_LEN: usize = 16;

/// Inclusive bounds on a key's length after dash-stripping.
const MIN_KEY_LEN: usize = 20;
const MAX_KEY_LEN: usize = 30;

/// Longest prefix that keeps a generated key under [`MAX_KEY_LEN`] once the
/// 25-character body is appended.
pub const MAX_PREFIX_LEN: usize = 5;

/// Signed payload hashed into every generated key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyPayload {
    /// Fresh random nonce, unique per call.
    nonce: Uuid,
    /// Issuance timestamp, seconds since the epoch.
    iat: i64,
    /// Owner reference, when the key is issued to a known user.
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    /// License type the key was issued against.
    #[serde(skip_serializing_if = "Option::is_none")]
    license_type: Option<LicenseTypeId>,
    /// Random uppercase-alphanumeric seed.
    seed: String,
}

/// Derives license key strings from a signing secret.
///
/// The secret is injected at construction; the codec never reads ambient
/// configuration.
#[derive(Clone)]
pub struct KeyCodec {
    secret: Vec<u8>,
}

impl KeyCodec {
    /// Creates a codec with the given signing secret.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Generates a new license key.
    ///
    /// Repeated calls with identical arguments produce different keys: the
    /// payload embeds a fresh nonce, a random seed, and the call timestamp.
    #[must_use]
    pub fn generate(
        &self,
        prefix: Option<&str>,
        owner: Option<&str>,
        license_type: Option<LicenseTypeId>,
    ) -> String {
        let payload = KeyPayload {
            nonce: Uuid::new_v4(),
            iat: Utc::now().timestamp(),
            owner: owner.map(str::to_owned),
            license_type,
            seed: random_seed(),
        };
        // a struct of scalars and strings always serializes
        let payload_json = serde_json::to_vec(&payload).expect("key payload serializes to JSON");
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        let token = format!("{payload_b64}.{sig_b64}");
        let digest = Sha256::digest(token.as_bytes());
        let body = &BASE32_NOPAD.encode(&digest)[..KEY_BODY_LEN];

        let combined = match prefix {
            Some(prefix) => format!("{prefix}-{body}"),
            None => body.to_string(),
        };
        group(&combined)
    }

    /// Checks a candidate key's surface format.
    ///
    /// Strips dashes, folds to uppercase, and requires 20 to 30 remaining
    /// characters, all from A-Z0-9. Purely syntactic: no signature check,
    /// no storage lookup.
    #[must_use]
    pub fn validate_format(key: &str) -> bool {
        let stripped: String = key
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_uppercase();
        (MIN_KEY_LEN..=MAX_KEY_LEN).contains(&stripped.len())
            && stripped.bytes().all(|b| KEY_ALPHABET.contains(&b))
    }

    /// Checks a candidate key prefix: 1 to 5 characters, all from A-Z0-9.
    ///
    /// Anything longer would push a generated key's stripped length past the
    /// ceiling enforced by [`Self::validate_format`].
    #[must_use]
    pub fn validate_prefix(prefix: &str) -> bool {
        !prefix.is_empty()
            && prefix.len() <= MAX_PREFIX_LEN
            && prefix.bytes().all(|b| KEY_ALPHABET.contains(&b))
    }
}

impl fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCodec").finish_non_exhaustive()
    }
}

/// Regroups a key (prefix and separator included) into dash-joined blocks.
fn group(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    chars
        .chunks(GROUP_LEN)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// Random seed drawn from the key alphabet.
fn random_seed() -> String {
    let mut rng = rand::thread_rng();
    (0..SEED_LEN)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_regroups_across_the_prefix_separator() {
        // a 4-character prefix puts the separator inside the first block,
        // so the regrouped form carries a double dash
        assert_eq!(group("ACME-ABCDEFGHIJ"), "ACME--ABCDE-FGHIJ");
        assert_eq!(group("ABCDEFGHIJ"), "ABCDE-FGHIJ");
    }

    #[test]
    fn seed_uses_the_key_alphabet() {
        let seed = random_seed();
        assert_eq!(seed.len(), SEED_LEN);
        assert!(seed.bytes().all(|b| KEY_ALPHABET.contains(&b)));
    }
}
