//! Public-key identities: raw keys, their npub encoding, and the signer seam.

pub mod codec;
pub mod signer;

pub use codec::{decode, encode, PublicKey};
pub use signer::{PublicKeySigner, SignerFailure, SignerGateway, StaticKeySigner};

use crate::domain::profile::Profile;
use serde::Serialize;

/// A logged-in principal. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub public_key: PublicKey,
    pub npub: String,
    pub profile: Profile,
}

impl Identity {
    pub fn new(public_key: PublicKey, profile: Profile) -> Self {
        Self {
            npub: encode(&public_key),
            public_key,
            profile,
        }
    }

    /// Name to register in the ledger.
    pub fn ledger_name(&self) -> &str {
        self.profile.display_name.as_deref().unwrap_or("Anonymous")
    }
}
