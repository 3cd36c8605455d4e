pub mod audit_log;
pub mod payment;
pub mod plan;
pub mod usage_grant;
pub mod user;

pub use audit_log::AuditAction;
pub use payment::{PaymentStatus, Transition};
pub use usage_grant::GrantKind;
