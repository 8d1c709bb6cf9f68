//! Upstream adapters for the VTU wallet backend.
//!
//! One module per upstream: Paystack, Flutterwave and Monnify on the payment side, VTpass and ClubKonnect on the
//! fulfillment side. Each adapter owns its transport quirks (auth headers, token caching, legacy query-string
//! protocols) and normalizes responses into the engine's closed outcome and error types at this boundary. Nothing
//! upstream-shaped leaks past this crate.
pub mod clubkonnect;
pub mod config;
pub mod flutterwave;
pub mod monnify;
pub mod paystack;
mod transport;
pub mod vtpass;

pub use clubkonnect::ClubKonnect;
pub use config::{ClubKonnectConfig, FlutterwaveConfig, MonnifyConfig, PaystackConfig, VtpassConfig};
pub use flutterwave::Flutterwave;
pub use monnify::Monnify;
pub use paystack::Paystack;
pub use vtpass::Vtpass;
