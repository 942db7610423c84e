//! Access to the external signing capability.
//!
//! The capability is injected at construction; nothing here reaches for an
//! ambient/global signer.

use crate::error::{Error, Result};
use crate::identity::codec::PublicKey;
use crate::infra::with_timeout_retry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Failure reported by a signing capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerFailure(pub String);

/// External signing capability (browser extension, hardware agent, ...).
#[async_trait]
pub trait PublicKeySigner: Send + Sync {
    async fn get_public_key(&self) -> std::result::Result<PublicKey, SignerFailure>;
}

/// Hands out one fixed key. Used by the headless `login` binary and tests.
pub struct StaticKeySigner {
    key: PublicKey,
}

impl StaticKeySigner {
    pub fn new(key: PublicKey) -> Self {
        Self { key }
    }

    /// Accepts hex or npub.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self::new(PublicKey::parse(s)?))
    }
}

#[async_trait]
impl PublicKeySigner for StaticKeySigner {
    async fn get_public_key(&self) -> std::result::Result<PublicKey, SignerFailure> {
        Ok(self.key)
    }
}

pub struct SignerGateway {
    signer: Option<Arc<dyn PublicKeySigner>>,
    timeout: Duration,
}

impl SignerGateway {
    pub fn new(signer: Option<Arc<dyn PublicKeySigner>>, timeout: Duration) -> Self {
        Self { signer, timeout }
    }

    pub fn is_available(&self) -> bool {
        self.signer.is_some()
    }

    /// Asks the capability for the user's public key. Not cached.
    pub async fn login(&self) -> Result<PublicKey> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            tracing::error!("no signing capability registered");
            Error::SignerUnavailable
        })?;

        let key = with_timeout_retry("signer getPublicKey", self.timeout, move || async move {
            signer
                .get_public_key()
                .await
                .map_err(|SignerFailure(reason)| Error::SignerRejected(reason))
        })
        .await?;

        tracing::debug!(pubkey = %key, "signer returned public key");
        Ok(key)
    }
}
