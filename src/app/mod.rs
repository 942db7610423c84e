pub mod ledger_service;
pub mod ownership_gateway;
pub mod session;

pub use ledger_service::OwnershipLedger;
pub use ownership_gateway::{HttpOwnershipGateway, LocalOwnershipGateway, OwnershipGateway};
pub use session::{SessionCoordinator, SessionEvent};
