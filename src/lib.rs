pub mod app;
pub mod domain;
pub mod error;
pub mod identity;
pub mod infra;
pub mod relay;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{OwnershipLedger, SessionCoordinator, SessionEvent};
pub use domain::profile::{Profile, ProfileResolver};
pub use error::{Error, Result};
pub use identity::{Identity, PublicKey, SignerGateway};
pub use relay::RelayPool;
pub use storage::ledger::{LedgerStore, MemoryLedgerStore, PostgresLedgerStore};
