use std::fmt;

use thiserror::Error;

/// Error type for password operations.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid hashing parameters: {0}")]
    InvalidParameters(String),
}

/// Character classes every password must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterClass::Uppercase => f.write_str("uppercase letter"),
            CharacterClass::Lowercase => f.write_str("lowercase letter"),
            CharacterClass::Digit => f.write_str("digit"),
            CharacterClass::Symbol => f.write_str("symbol"),
        }
    }
}

fn join_classes(classes: &[CharacterClass]) -> String {
    classes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", one ")
}

/// Password strength violations. Details are safe to show to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Password too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("Password must contain at least one {}", join_classes(.0))]
    MissingCharacterClasses(Vec<CharacterClass>),

    #[error("Password is too common, choose a stronger one")]
    Common,

    #[error("Password must not consist only of digits or only of letters")]
    SingleCharacterKind,
}
