use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;

/// Signs opaque tokens as `<token>.<hex hmac>`. The purpose string is mixed
/// into the MAC so a token signed for one cookie never verifies for another.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    purpose: &'static str,
}

impl TokenSigner {
    pub fn new(secret: &[u8], purpose: &'static str) -> Self {
        Self {
            key: secret.to_vec(),
            purpose,
        }
    }

    pub fn session(secret: &[u8]) -> Self {
        Self::new(secret, "session")
    }

    pub fn csrf(secret: &[u8]) -> Self {
        Self::new(secret, "csrf")
    }

    fn mac(&self, token: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(self.purpose.as_bytes());
        mac.update(b":");
        mac.update(token.as_bytes());
        mac
    }

    pub fn sign(&self, token: &str) -> String {
        let digest = self.mac(token).finalize().into_bytes();
        format!("{}.{}", token, hex::encode(digest))
    }

    /// Returns the raw token when the signature checks out.
    pub fn verify<'a>(&self, signed: &'a str) -> Option<&'a str> {
        let (token, signature) = signed.split_once('.')?;
        if token.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        self.mac(token).verify_slice(&signature).ok()?;
        Some(token)
    }

    /// Fresh random token, already signed.
    pub fn issue(&self) -> String {
        self.sign(&random_token())
    }
}

pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn signed_tokens_verify() {
        let signer = TokenSigner::session(SECRET);
        let signed = signer.issue();
        let token = signer.verify(&signed).expect("valid signature");
        assert_eq!(signed.split_once('.').unwrap().0, token);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let signer = TokenSigner::session(SECRET);
        let signed = signer.sign("abc");
        let forged = signed.replacen("abc", "abd", 1);
        assert!(signer.verify(&forged).is_none());
        assert!(signer.verify("abc").is_none());
        assert!(signer.verify(".deadbeef").is_none());
    }

    #[test]
    fn purposes_do_not_cross_verify() {
        let csrf = TokenSigner::csrf(SECRET).issue();
        assert!(TokenSigner::session(SECRET).verify(&csrf).is_none());
    }

    #[test]
    fn other_secrets_do_not_verify() {
        let signed = TokenSigner::csrf(SECRET).issue();
        let other = TokenSigner::csrf(b"ffffffffffffffffffffffffffffffff");
        assert!(other.verify(&signed).is_none());
    }

    #[test]
    fn constant_time_eq_compares_content() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
