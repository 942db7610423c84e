use crate::identity::PublicKey;
use crate::relay::{Filter, Liveness, RelayEvent, RelayPool, KIND_METADATA};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use utoipa::ToSchema;

/// Display profile reduced from a metadata event. Absent fields stay absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "avatarURI", skip_serializing_if = "Option::is_none")]
    pub avatar_uri: Option<String>,
}

#[derive(Deserialize, Default)]
struct MetadataContent {
    name: Option<String>,
    display_name: Option<String>,
    picture: Option<String>,
    image: Option<String>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_uri.is_none()
    }

    /// Parses kind-0 content. Unparseable content gives an empty profile.
    pub fn from_metadata(content: &str) -> Self {
        let meta: MetadataContent = serde_json::from_str(content).unwrap_or_default();
        Self {
            display_name: non_empty(meta.name).or_else(|| non_empty(meta.display_name)),
            avatar_uri: non_empty(meta.picture).or_else(|| non_empty(meta.image)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct ProfileResolver {
    pool: RelayPool,
    endpoints: Vec<String>,
}

impl ProfileResolver {
    pub fn new(pool: RelayPool, endpoints: Vec<String>) -> Self {
        Self { pool, endpoints }
    }

    /// Best effort: returns whatever profile is known when `timeout` expires,
    /// and the empty profile if no relay answers at all.
    pub async fn resolve(&self, key: &PublicKey, timeout: Duration) -> Profile {
        let deadline = Instant::now() + timeout;

        match tokio::time::timeout_at(deadline, self.pool.connect(&self.endpoints)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(author = %key, error = %e, "profile lookup skipped");
                return Profile::default();
            }
            Err(_) => {
                tracing::warn!(author = %key, "relay connect exceeded profile budget");
                return Profile::default();
            }
        }

        let filter = Filter::new().kind(KIND_METADATA).author(*key);
        let mut sub = match self.pool.subscribe(filter, Liveness::CloseOnEose) {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!(author = %key, error = %e, "profile lookup skipped");
                return Profile::default();
            }
        };

        let mut latest: Option<RelayEvent> = None;
        loop {
            match tokio::time::timeout_at(deadline, sub.next()).await {
                Ok(Some(event)) => {
                    if latest.as_ref().map_or(true, |l| event.created_at >= l.created_at) {
                        latest = Some(event);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!(author = %key, "profile lookup timed out, using what arrived");
                    break;
                }
            }
        }
        sub.cancel();

        latest
            .map(|event| Profile::from_metadata(&event.content))
            .unwrap_or_default()
    }
}
