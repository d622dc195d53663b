pub mod principal;
pub mod token;

pub use principal::PostgresPrincipalRepository;
pub use token::PostgresTokenRepository;
