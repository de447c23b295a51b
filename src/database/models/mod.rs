pub mod holding;
pub mod security;
pub mod transaction;
pub mod user;

pub use holding::{HoldingRow, SummaryRow};
pub use security::{NewSecurity, Security};
pub use transaction::{NewTransaction, Transaction, TransactionWithSecurity};
pub use user::{Identity, Session, UserRow};
