use std::collections::HashSet;
use std::fmt;

use zeroize::Zeroizing;

use crate::error::{PkiError, Result};

/// Substrings that make a password weak: keyboard walks, digit runs and
/// common words. Matched against the lowercased password.
pub const WEAK_PATTERNS: &[&str] = &[
    "qwert", "2345", "admin", "user", "qwaszx", "qweasd", "qazwsx", "wsxedc", "wqsaxz", "ewqdsa",
    "zaqxsw", "xswzaq", "qscwdv", "csqvdw", "5432", "5678", "9876", "zaxqsc", "qscax", "csqxa",
    "trewq", "asdfg", "zxcvb", "bvcxz", "gfdsa", "password",
];

/// Why a password was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Missing, or shorter than the minimum length.
    TooShort,
    /// Contains a keyboard walk, digit run or common word.
    WeakPattern,
    /// Contains something other than letters and digits.
    NotAlphanumeric,
    /// Less than half of the characters are letters.
    TooFewLetters,
    /// Too many repeated characters.
    TooFewDistinct,
    /// Fewer than the required number of digits.
    TooFewDigits,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Rejection::TooShort => "at least 15 letters and digits are required",
            Rejection::WeakPattern => {
                "must not contain sequences like qwerty, 12345, admin, user or password"
            }
            Rejection::NotAlphanumeric => "only letters and digits are allowed",
            Rejection::TooFewLetters => "at least 50% of the characters must be letters",
            Rejection::TooFewDistinct => "at least 60% of the characters must be different",
            Rejection::TooFewDigits => "at least 3 of the characters must be digits",
        };
        f.write_str(msg)
    }
}

/// Strength rules applied to operator supplied keystore passwords.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub min_digits: usize,
    /// Lower bound for letters / all, with a little slack for rounding.
    pub min_letter_ratio: f64,
    /// Lower bound for distinct / all, with a little slack for rounding.
    pub min_distinct_ratio: f64,
    pub weak_patterns: &'static [&'static str],
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 15,
            min_digits: 3,
            min_letter_ratio: 0.49999999999,
            min_distinct_ratio: 0.59999999999,
            weak_patterns: WEAK_PATTERNS,
        }
    }
}

impl PasswordPolicy {
    /// Checks a password against the policy. `None` counts as too short.
    pub fn check(&self, password: Option<&str>) -> std::result::Result<(), Rejection> {
        let password = password.ok_or(Rejection::TooShort)?;
        let total = password.chars().count();
        if total < self.min_length {
            return Err(Rejection::TooShort);
        }

        let lowered = Zeroizing::new(password.to_lowercase());
        if self.weak_patterns.iter().any(|p| lowered.contains(p)) {
            return Err(Rejection::WeakPattern);
        }

        let mut distinct = HashSet::new();
        let mut digits = 0usize;
        let mut letters = 0usize;
        for ch in password.chars() {
            // Only decimal digits count; superscripts and numeral letters are neither.
            if ch.is_ascii_digit() {
                digits += 1;
            } else if ch.is_alphabetic() && !ch.is_numeric() {
                letters += 1;
            } else {
                return Err(Rejection::NotAlphanumeric);
            }
            distinct.insert(ch);
        }

        let total = total as f64;
        if (letters as f64) / total < self.min_letter_ratio {
            return Err(Rejection::TooFewLetters);
        }
        if (distinct.len() as f64) / total < self.min_distinct_ratio {
            return Err(Rejection::TooFewDistinct);
        }
        if digits < self.min_digits {
            return Err(Rejection::TooFewDigits);
        }
        Ok(())
    }
}

/// Checks a password with the default policy.
///
/// Returns `None` when the password is strong enough, otherwise the reason
/// it was refused.
pub fn check_strength(password: Option<&str>) -> Option<Rejection> {
    PasswordPolicy::default().check(password).err()
}

/// A keystore password, wiped from memory when dropped.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Password(Zeroizing::new(password.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares with the value typed into a "repeat password" field.
    pub fn confirm(&self, confirmation: &Password) -> Result<()> {
        if self.0.as_bytes() != confirmation.0.as_bytes() {
            return Err(PkiError::PasswordMismatch);
        }
        Ok(())
    }

    /// Fails with [`PkiError::WeakPassword`] unless the default policy
    /// accepts the password.
    pub fn ensure_strong(&self) -> Result<()> {
        match check_strength(Some(self.as_str())) {
            None => Ok(()),
            Some(rejection) => Err(PkiError::WeakPassword(rejection)),
        }
    }

    /// UTF-8 bytes, as PBES2 expects them.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Password::new(value)
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Password::new(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_passwords_accepted() {
        assert_eq!(check_strength(Some("gracailikiki213")), None);
        assert_eq!(check_strength(Some("deviLWoodgrovE155")), None);
    }

    #[test]
    fn test_missing_and_empty_rejected() {
        assert_eq!(check_strength(None), Some(Rejection::TooShort));
        assert_eq!(check_strength(Some("")), Some(Rejection::TooShort));
        assert_eq!(check_strength(Some("hhkjhkauwsy")), Some(Rejection::TooShort));
    }

    #[test]
    fn test_rules_in_order() {
        assert_eq!(
            check_strength(Some("myQwertyKeys9381")),
            Some(Rejection::WeakPattern)
        );
        assert_eq!(
            check_strength(Some("hjgk!lmnopqrs4192")),
            Some(Rejection::NotAlphanumeric)
        );
        assert_eq!(
            check_strength(Some("a1b2c3d4e6f7g8h90")),
            Some(Rejection::TooFewLetters)
        );
        assert_eq!(
            check_strength(Some("aaaaaaaaaabbb193c")),
            Some(Rejection::TooFewDistinct)
        );
        assert_eq!(
            check_strength(Some("abcdefghijklmnop12")),
            Some(Rejection::TooFewDigits)
        );
    }

    #[test]
    fn test_ratio_boundaries_accepted() {
        // exactly half letters
        assert_eq!(check_strength(Some("abcdefgh13579086")), None);
        // exactly 60% distinct
        assert_eq!(check_strength(Some("aabbccddeeff123")), None);
    }

    #[test]
    fn test_non_decimal_numerals_are_not_alphanumeric() {
        for password in ["gracailikiki\u{b2}\u{b9}\u{b3}", "gracailikiki\u{216b}213"] {
            assert_eq!(
                check_strength(Some(password)),
                Some(Rejection::NotAlphanumeric),
                "{password:?}"
            );
        }
        // letters outside ASCII still count as letters
        assert_eq!(check_strength(Some("gr\u{e4}cailikiki213")), None);
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        assert_eq!(
            check_strength(Some("xyADMINlkjhg8471")),
            Some(Rejection::WeakPattern)
        );
    }

    #[test]
    fn test_confirm_mismatch() {
        let password = Password::new("gracailikiki213");
        assert!(password.confirm(&Password::new("gracailikiki213")).is_ok());
        assert!(matches!(
            password.confirm(&Password::new("gracailikiki231")),
            Err(PkiError::PasswordMismatch)
        ));
        assert_eq!(format!("{password:?}"), "Password(***)");
    }

    #[test]
    fn test_ensure_strong() {
        assert!(Password::new("deviLWoodgrovE155").ensure_strong().is_ok());
        assert!(matches!(
            Password::new("adminadminadmin123").ensure_strong(),
            Err(PkiError::WeakPassword(Rejection::WeakPattern))
        ));
    }
}
