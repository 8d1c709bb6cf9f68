use log::*;
use vtu_common::Secret;

fn env_or_warn(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| {
        warn!("🪛️ {var} not set, using a (probably useless) default");
        default.to_string()
    })
}

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: Secret,
    /// Preferred bank for dedicated accounts, e.g. "wema-bank".
    pub preferred_bank: String,
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url =
            std::env::var("VTU_PAYSTACK_BASE_URL").unwrap_or_else(|_| "https://api.paystack.co".to_string());
        let secret_key = Secret::new(env_or_warn("VTU_PAYSTACK_SECRET_KEY", "sk_test_00000000000000"));
        let preferred_bank =
            std::env::var("VTU_PAYSTACK_PREFERRED_BANK").unwrap_or_else(|_| "wema-bank".to_string());
        Self { base_url, secret_key, preferred_bank }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlutterwaveConfig {
    pub base_url: String,
    pub secret_key: Secret,
    /// Where the checkout redirects after payment. Informational for the client; settlement never trusts it.
    pub redirect_url: String,
}

impl FlutterwaveConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url =
            std::env::var("VTU_FLUTTERWAVE_BASE_URL").unwrap_or_else(|_| "https://api.flutterwave.com".to_string());
        let secret_key = Secret::new(env_or_warn("VTU_FLUTTERWAVE_SECRET_KEY", "FLWSECK_TEST-00000000000000"));
        let redirect_url =
            std::env::var("VTU_FLUTTERWAVE_REDIRECT_URL").unwrap_or_else(|_| "https://example.com/done".to_string());
        Self { base_url, secret_key, redirect_url }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonnifyConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: Secret,
    pub contract_code: String,
}

impl MonnifyConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url =
            std::env::var("VTU_MONNIFY_BASE_URL").unwrap_or_else(|_| "https://api.monnify.com".to_string());
        let api_key = env_or_warn("VTU_MONNIFY_API_KEY", "MK_TEST_00000000");
        let secret_key = Secret::new(env_or_warn("VTU_MONNIFY_SECRET_KEY", "00000000"));
        let contract_code = env_or_warn("VTU_MONNIFY_CONTRACT_CODE", "0000000000");
        Self { base_url, api_key, secret_key, contract_code }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VtpassConfig {
    pub base_url: String,
    pub api_key: String,
    /// Sent as `secret-key` on POST requests.
    pub secret_key: Secret,
    /// Sent as `public-key` on GET requests.
    pub public_key: String,
}

impl VtpassConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url =
            std::env::var("VTU_VTPASS_BASE_URL").unwrap_or_else(|_| "https://vtpass.com".to_string());
        let api_key = env_or_warn("VTU_VTPASS_API_KEY", "00000000");
        let secret_key = Secret::new(env_or_warn("VTU_VTPASS_SECRET_KEY", "SK_00000000"));
        let public_key = env_or_warn("VTU_VTPASS_PUBLIC_KEY", "PK_00000000");
        Self { base_url, api_key, secret_key, public_key }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClubKonnectConfig {
    pub base_url: String,
    pub user_id: String,
    pub api_key: Secret,
}

impl ClubKonnectConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url =
            std::env::var("VTU_CLUBKONNECT_BASE_URL").unwrap_or_else(|_| "https://www.nellobytesystems.com".to_string());
        let user_id = env_or_warn("VTU_CLUBKONNECT_USER_ID", "CK000000");
        let api_key = Secret::new(env_or_warn("VTU_CLUBKONNECT_API_KEY", "00000000"));
        Self { base_url, user_id, api_key }
    }
}
