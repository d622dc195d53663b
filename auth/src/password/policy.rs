use super::errors::CharacterClass;
use super::errors::PasswordPolicyError;

/// Password composition rules.
///
/// Rules run in order and the first violation wins: length, character classes
/// (every missing class reported at once), common-password denylist, and
/// finally single-kind passwords (only digits or only letters).
pub struct PasswordPolicy;

impl PasswordPolicy {
    pub const MIN_LENGTH: usize = 8;
    pub const MAX_LENGTH: usize = 128;

    const COMMON_PASSWORDS: [&'static str; 16] = [
        "password",
        "12345678",
        "123456789",
        "1234567890",
        "qwerty",
        "abc123",
        "password1",
        "admin123",
        "letmein",
        "welcome",
        "monkey",
        "1234567",
        "sunshine",
        "princess",
        "football",
        "iloveyou",
    ];

    /// Check a candidate secret against every rule.
    ///
    /// # Errors
    /// * `TooShort` / `TooLong` - Length outside 8..=128 characters
    /// * `MissingCharacterClasses` - Lacks an uppercase, lowercase, digit or symbol
    /// * `Common` - Matches the denylist, ignoring case
    /// * `SingleCharacterKind` - Only digits or only letters
    pub fn validate(password: &str) -> Result<(), PasswordPolicyError> {
        Self::with_valid_length(password)?;
        Self::with_all_classes(password)?;
        Self::not_common(password)?;
        Self::not_single_kind(password)
    }

    fn with_valid_length(password: &str) -> Result<(), PasswordPolicyError> {
        let length = password.chars().count();
        if length < Self::MIN_LENGTH {
            Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(PasswordPolicyError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(())
        }
    }

    fn with_all_classes(password: &str) -> Result<(), PasswordPolicyError> {
        let mut has_upper = false;
        let mut has_lower = false;
        let mut has_digit = false;
        let mut has_symbol = false;

        for c in password.chars() {
            if c.is_uppercase() {
                has_upper = true;
            } else if c.is_lowercase() {
                has_lower = true;
            } else if c.is_numeric() {
                has_digit = true;
            } else if !c.is_alphabetic() && !c.is_whitespace() && !c.is_control() {
                has_symbol = true;
            }
        }

        let missing: Vec<CharacterClass> = [
            (has_upper, CharacterClass::Uppercase),
            (has_lower, CharacterClass::Lowercase),
            (has_digit, CharacterClass::Digit),
            (has_symbol, CharacterClass::Symbol),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, class)| class)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PasswordPolicyError::MissingCharacterClasses(missing))
        }
    }

    fn not_common(password: &str) -> Result<(), PasswordPolicyError> {
        let lowered = password.to_lowercase();
        if Self::COMMON_PASSWORDS.iter().any(|common| *common == lowered) {
            Err(PasswordPolicyError::Common)
        } else {
            Ok(())
        }
    }

    fn not_single_kind(password: &str) -> Result<(), PasswordPolicyError> {
        let only_digits = password.chars().all(|c| c.is_ascii_digit());
        let only_letters = password.chars().all(|c| c.is_ascii_alphabetic());

        if only_digits || only_letters {
            Err(PasswordPolicyError::SingleCharacterKind)
        } else {
            Ok(())
        }
    }
}

/// Validate a candidate secret against [`PasswordPolicy`].
pub fn validate_password_strength(password: &str) -> Result<(), PasswordPolicyError> {
    PasswordPolicy::validate(password)
}
