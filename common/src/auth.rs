//! Shared-secret request signing for the control plane.
//!
//! The canonical message is the URL-encoded form with keys in sorted order;
//! the digest is HMAC-SHA512, hex-encoded, carried in the `signed` header.
//! Both the server and the ops client sign with the same code path.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

#[derive(Clone)]
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, message: &str) -> HmacSha512 {
        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        mac
    }

    /// Hex digest of the canonical message.
    pub fn sign(&self, message: &str) -> String {
        hex::encode(self.mac(message).finalize().into_bytes())
    }

    /// Constant-time verification of a client-supplied hex digest.
    pub fn verify(&self, message: &str, signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        self.mac(message).verify_slice(&signature).is_ok()
    }
}

/// Canonical form encoding: keys sorted, `k=v` pairs joined by `&`, values
/// percent-encoded the way `application/x-www-form-urlencoded` does.
pub fn canonical_form<'a, I>(sorted_pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in sorted_pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}
