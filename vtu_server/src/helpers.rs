use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA512 over the raw webhook body. Paystack and Monnify both sign with this scheme.
pub fn hmac_sha512_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature against the body without branching on a byte-by-byte comparison of attacker-supplied
/// input. Signature length leaks, content does not.
pub fn hmac_sha512_matches(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

/// Constant-time equality for static shared-secret headers (Flutterwave's `verif-hash`).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    // RFC 4231 test case 2 (key "Jefe", data "what do ya want for nothing?").
    const RFC4231_HMAC: &str = "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
                                9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737";

    #[test]
    fn hmac_sha512_matches_the_rfc_vectors() {
        assert_eq!(hmac_sha512_hex("Jefe", b"what do ya want for nothing?"), RFC4231_HMAC);
    }

    #[test]
    fn signature_checks_accept_only_the_right_signature() {
        let body = b"what do ya want for nothing?";
        assert!(hmac_sha512_matches("Jefe", body, RFC4231_HMAC));
        assert!(!hmac_sha512_matches("Jefe", b"tampered body", RFC4231_HMAC));
        assert!(!hmac_sha512_matches("wrong key", body, RFC4231_HMAC));
        assert!(!hmac_sha512_matches("Jefe", body, "not even hex"));
    }

    #[test]
    fn constant_time_eq_compares_content_and_length() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
