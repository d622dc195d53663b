//! Authentication utilities library
//!
//! Provides reusable credential primitives for the session service:
//! - Password hashing (Argon2id) and password strength policy
//! - Access token signing and verification (HS256 only, with clock-skew tolerance)
//! - Opaque high-entropy token generation and token fingerprinting
//! - Authentication coordination
//!
//! # Examples
//!
//! ## Password Policy
//! ```
//! use auth::validate_password_strength;
//!
//! assert!(validate_password_strength("Abc12345!").is_ok());
//! assert!(validate_password_strength("password").is_err());
//! ```
//!
//! ## Access Tokens
//! ```
//! use auth::TokenCodec;
//! use chrono::Duration;
//!
//! let codec = TokenCodec::new(b"secret_key_at_least_32_bytes_long!");
//! let issued = codec.issue("user123", "admin", Duration::minutes(15)).unwrap();
//! let claims = codec.verify(&issued.token).unwrap();
//! assert_eq!(claims.role, "admin");
//! ```
//!
//! ## Opaque Tokens
//! ```
//! use auth::token::fingerprint;
//! use auth::token::generate_opaque_token;
//!
//! let refresh = generate_opaque_token().unwrap();
//! assert_eq!(fingerprint(&refresh).len(), 64);
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;
pub mod token;

// Re-export commonly used items
pub use authenticator::Authenticator;
pub use jwt::AccessClaims;
pub use jwt::IssuedToken;
pub use jwt::JwtError;
pub use jwt::TokenCodec;
pub use password::validate_password_strength;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordPolicyError;
