//! Client side of Cognito's SRP-6a password verification.
//!
//! Cognito's `USER_SRP_AUTH` flow never sends the password. The client
//! sends `A = g^a`, Cognito answers with its public value `B`, a salt and
//! an opaque secret block, and the client proves knowledge of the
//! password by signing the secret block with a key derived from the
//! shared secret.
//!
//! Big integers are hex-encoded the way Cognito expects: lowercase, and
//! padded with a leading zero byte whenever the high bit is set.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// The 3072-bit group from RFC 3526 used by every Cognito user pool.
const N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64",
    "ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6B",
    "F12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31",
    "43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);

/// Generator of the group.
const G: u32 = 2;

/// HKDF info string fixed by Cognito.
const DERIVED_KEY_INFO: &[u8] = b"Caldera Derived Key";

/// Bytes of randomness in the client's private value.
const PRIVATE_VALUE_BYTES: usize = 128;

/// Reasons a `PASSWORD_VERIFIER` challenge cannot be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SrpError {
    /// A challenge parameter was not valid hex or base64.
    #[error("invalid {0} in SRP challenge")]
    Encoding(&'static str),

    /// The server value would leak the session key.
    #[error("SRP server value is a multiple of N")]
    UnsafeServerValue,

    /// The scrambling parameter hashed to zero.
    #[error("SRP scrambling parameter is zero")]
    ZeroScrambler,
}

/// Values Cognito sends with the `PASSWORD_VERIFIER` challenge.
#[derive(Debug, Clone, Copy)]
pub struct Challenge<'a> {
    /// `USER_ID_FOR_SRP`, the internal user name.
    pub user_id: &'a str,
    /// `SALT`, hex.
    pub salt_hex: &'a str,
    /// `SRP_B`, hex.
    pub server_public_hex: &'a str,
    /// `SECRET_BLOCK`, base64.
    pub secret_block: &'a str,
}

/// One login attempt's ephemeral key pair.
pub struct SrpSession {
    n: BigUint,
    g: BigUint,
    k: BigUint,
    private: BigUint,
    public: BigUint,
}

impl SrpSession {
    /// Start an attempt with a fresh random private value.
    pub fn new() -> Self {
        let mut bytes = [0u8; PRIVATE_VALUE_BYTES];
        rand::rng().fill(&mut bytes[..]);
        Self::with_private(BigUint::from_bytes_be(&bytes))
    }

    pub(crate) fn with_private(private: BigUint) -> Self {
        let n = group_prime();
        let g = BigUint::from(G);
        let k = multiplier(&n, &g);
        // A zero private value would make A = 1 and leak the key.
        let private = if private == BigUint::from(0u32) {
            BigUint::from(1u32)
        } else {
            private
        };
        let public = g.modpow(&private, &n);
        Self {
            n,
            g,
            k,
            private,
            public,
        }
    }

    /// `SRP_A` for `InitiateAuth`.
    pub fn public_hex(&self) -> String {
        self.public.to_str_radix(16)
    }

    /// Compute `PASSWORD_CLAIM_SIGNATURE` for a challenge.
    ///
    /// `pool_name` is the part of the user pool id after the underscore
    /// and `timestamp` must be the exact string sent as `TIMESTAMP`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed or unsafe challenge values.
    pub fn password_signature(
        &self,
        pool_name: &str,
        password: &str,
        challenge: &Challenge<'_>,
        timestamp: &str,
    ) -> Result<String, SrpError> {
        let server_public = BigUint::parse_bytes(challenge.server_public_hex.as_bytes(), 16)
            .ok_or(SrpError::Encoding("SRP_B"))?;
        if (&server_public % &self.n) == BigUint::from(0u32) {
            return Err(SrpError::UnsafeServerValue);
        }
        let salt = decode_hex(&pad_hex_str(challenge.salt_hex)).ok_or(SrpError::Encoding("SALT"))?;
        let secret_block = BASE64
            .decode(challenge.secret_block)
            .map_err(|_| SrpError::Encoding("SECRET_BLOCK"))?;

        let u = scrambler(&self.public, &server_public);
        if u == BigUint::from(0u32) {
            return Err(SrpError::ZeroScrambler);
        }
        let x = private_key(&salt, pool_name, challenge.user_id, password);

        // S = (B - k * g^x) ^ (a + u * x) mod N
        let kgx = (&self.k * self.g.modpow(&x, &self.n)) % &self.n;
        let base = ((&server_public % &self.n) + &self.n - kgx) % &self.n;
        let shared = base.modpow(&(&self.private + &u * &x), &self.n);

        let key = derive_key(&shared, &u);
        let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts any key length");
        mac.update(pool_name.as_bytes());
        mac.update(challenge.user_id.as_bytes());
        mac.update(&secret_block);
        mac.update(timestamp.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl Default for SrpSession {
    fn default() -> Self {
        Self::new()
    }
}

/// `TIMESTAMP` in Cognito's format, e.g. `Tue Mar 5 07:04:09 UTC 2024`.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %-d %H:%M:%S UTC %Y").to_string()
}

pub(crate) fn group_prime() -> BigUint {
    BigUint::parse_bytes(N_HEX.as_bytes(), 16).expect("group prime is valid hex")
}

/// `k = H(N | g)`.
pub(crate) fn multiplier(n: &BigUint, g: &BigUint) -> BigUint {
    hash_to_int(&[&padded_bytes(n)[..], &padded_bytes(g)[..]])
}

/// `u = H(A | B)`.
pub(crate) fn scrambler(client_public: &BigUint, server_public: &BigUint) -> BigUint {
    hash_to_int(&[
        &padded_bytes(client_public)[..],
        &padded_bytes(server_public)[..],
    ])
}

/// `x = H(salt | H(pool_name | user_id ":" password))`.
pub(crate) fn private_key(salt: &[u8], pool_name: &str, user_id: &str, password: &str) -> BigUint {
    let identity = Sha256::new()
        .chain_update(pool_name.as_bytes())
        .chain_update(user_id.as_bytes())
        .chain_update(b":")
        .chain_update(password.as_bytes())
        .finalize();
    hash_to_int(&[salt, identity.as_slice()])
}

/// HKDF-SHA256 of the shared secret salted with `u`, truncated to 16 bytes.
pub(crate) fn derive_key(shared: &BigUint, u: &BigUint) -> [u8; 16] {
    let mut extract =
        HmacSha256::new_from_slice(&padded_bytes(u)).expect("HMAC accepts any key length");
    extract.update(&padded_bytes(shared));
    let prk = extract.finalize().into_bytes();

    let mut expand = HmacSha256::new_from_slice(&prk).expect("HMAC accepts any key length");
    expand.update(DERIVED_KEY_INFO);
    expand.update(&[1]);
    let okm = expand.finalize().into_bytes();

    let mut key = [0u8; 16];
    key.copy_from_slice(&okm[..16]);
    key
}

fn hash_to_int(parts: &[&[u8]]) -> BigUint {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    BigUint::from_bytes_be(&hasher.finalize())
}

/// Big-endian bytes with a leading zero byte when the high bit is set.
pub(crate) fn padded_bytes(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes[0] & 0x80 == 0 {
        bytes
    } else {
        let mut padded = Vec::with_capacity(bytes.len() + 1);
        padded.push(0);
        padded.extend_from_slice(&bytes);
        padded
    }
}

/// Pad a hex string to whole bytes, adding a zero byte before a set high bit.
fn pad_hex_str(hex: &str) -> String {
    if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else if hex.starts_with(|c: char| matches!(c, '8'..='9' | 'a'..='f' | 'A'..='F')) {
        format!("00{hex}")
    } else {
        hex.to_string()
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 == 1 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
