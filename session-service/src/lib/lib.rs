pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod security;

pub use domain::principal;
pub use domain::session;
pub use outbound::repositories;
