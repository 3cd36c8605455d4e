pub mod audit;
pub mod plan;
pub mod provision;
pub mod review;
#[cfg(test)]
pub mod test_utils;
pub mod trial;
pub mod txn;
pub mod usage;
pub mod user;

pub use audit::Audit;
pub use plan::Plan;
pub use review::Review;
pub use trial::Trial;
pub use usage::Usage;
pub use user::User;
