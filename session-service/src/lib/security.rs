pub mod audit;
pub mod rate_limit;
pub mod revocation;
pub mod sweeper;
