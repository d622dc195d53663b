pub mod argon2;
pub mod errors;
pub mod policy;

pub use argon2::PasswordHasher;
pub use errors::CharacterClass;
pub use errors::PasswordError;
pub use errors::PasswordPolicyError;
pub use policy::validate_password_strength;
pub use policy::PasswordPolicy;
