//! Redacting wrapper for upstream credentials.
//!
//! Every credential this workspace handles is a string: gateway secret keys for the Bearer and Basic-auth
//! headers, webhook signing secrets, and the static verification hashes some gateways use instead. [`Secret`]
//! keeps them out of logs and Debug dumps; config structs and error formatters can derive `Debug` freely
//! without leaking a key. Access to the raw value goes through [`Secret::reveal`], so every place a credential
//! leaves the process is greppable.
use std::fmt;

#[derive(Clone, Default)]
pub struct Secret {
    value: String,
}

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into() }
    }

    /// The raw credential, for building auth headers and verifying signatures.
    pub fn reveal(&self) -> &str {
        &self.value
    }

    /// Whether a credential was actually configured. An unset secret must fail closed, never verify.
    pub fn is_set(&self) -> bool {
        !self.value.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn api_keys_never_appear_in_debug_or_display_output() {
        let key = Secret::new("sk_live_8f3a1b2c4d5e");
        assert_eq!(format!("{key:?}"), "****");
        assert_eq!(format!("{key}"), "****");
        assert_eq!(key.reveal(), "sk_live_8f3a1b2c4d5e");
    }

    #[test]
    fn config_structs_holding_secrets_redact_them() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct GatewayConfig {
            api_key: String,
            webhook_secret: Secret,
        }
        let config =
            GatewayConfig { api_key: "pk_public".to_string(), webhook_secret: Secret::new("whsec_topsecret") };
        let dump = format!("{config:?}");
        assert!(dump.contains("pk_public"));
        assert!(!dump.contains("whsec_topsecret"));
    }

    #[test]
    fn unset_secrets_report_as_such() {
        assert!(!Secret::default().is_set());
        assert!(Secret::new("x").is_set());
    }
}
