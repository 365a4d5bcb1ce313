//! Password and one-time code generation.
//!
//! Every random draw comes from the operating system CSPRNG. `OsRng` panics if
//! the OS source fails; there is no fallback to a weaker generator.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};

use crate::config::{ConfigError, OtpPolicy, PasswordPolicy};
use crate::constants::{
    DIGIT_CHARSET, LOWERCASE_CHARSET, MAX_OTP_DIGITS, MAX_PASSWORD_MIN_LENGTH, MIN_DIGIT_CHARS,
    MIN_LOWERCASE_CHARS, MIN_SPECIAL_CHARS, MIN_UPPERCASE_CHARS, PASSWORD_EXTRA_LENGTH,
    SPECIAL_CHARSET, UPPERCASE_CHARSET,
};

/// The first policy rule a candidate password breaks.
#[derive(Debug, Clone, PartialEq)]
pub enum PasswordPolicyError {
    TooShort(usize),
    MissingLetter,
    MissingDigit,
    MissingUppercase,
    MissingLowercase,
}

impl std::fmt::Display for PasswordPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordPolicyError::TooShort(min) => {
                write!(f, "Password must be at least {} characters", min)
            }
            PasswordPolicyError::MissingLetter => write!(f, "Password must contain a letter"),
            PasswordPolicyError::MissingDigit => write!(f, "Password must contain a digit"),
            PasswordPolicyError::MissingUppercase => {
                write!(f, "Password must contain an uppercase letter")
            }
            PasswordPolicyError::MissingLowercase => {
                write!(f, "Password must contain a lowercase letter")
            }
        }
    }
}

impl std::error::Error for PasswordPolicyError {}

pub struct SecretGenerator {
    policy: PasswordPolicy,
    otp: OtpPolicy,
}

impl SecretGenerator {
    pub fn new(policy: PasswordPolicy, otp: OtpPolicy) -> Result<Self, ConfigError> {
        if policy.min_length > MAX_PASSWORD_MIN_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "password_min_length must be at most {}",
                MAX_PASSWORD_MIN_LENGTH
            )));
        }
        if otp.digits == 0 || otp.digits > MAX_OTP_DIGITS {
            return Err(ConfigError::Invalid(format!(
                "otp_digits must be between 1 and {}",
                MAX_OTP_DIGITS
            )));
        }
        Ok(Self { policy, otp })
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// True iff `candidate` satisfies every enabled rule of the policy.
    pub fn check_password(&self, candidate: &str) -> bool {
        self.validate_password(candidate).is_ok()
    }

    /// Like [`check_password`](Self::check_password) but reports the broken rule.
    pub fn validate_password(&self, candidate: &str) -> Result<(), PasswordPolicyError> {
        let policy = &self.policy;

        if candidate.chars().count() < policy.min_length {
            return Err(PasswordPolicyError::TooShort(policy.min_length));
        }
        if policy.include_chars && !candidate.chars().any(char::is_alphabetic) {
            return Err(PasswordPolicyError::MissingLetter);
        }
        if policy.include_digits && !candidate.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }
        if policy.include_lowercase && !candidate.chars().any(is_lowercase_letter) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if policy.include_uppercase && !candidate.chars().any(is_uppercase_letter) {
            return Err(PasswordPolicyError::MissingUppercase);
        }
        Ok(())
    }

    /// Generate a password that always passes [`check_password`](Self::check_password).
    ///
    /// Length is `min_length + 2`, or the sum of the per-class minimums when
    /// that is larger.
    pub fn generate_password(&self) -> String {
        let mut rng = OsRng;
        let policy = &self.policy;
        let target = policy
            .min_length
            .min(MAX_PASSWORD_MIN_LENGTH)
            .saturating_add(PASSWORD_EXTRA_LENGTH);

        // A letter requirement with both case switches off still needs letters.
        let letters_only = policy.include_chars && !policy.include_uppercase && !policy.include_lowercase;

        let class_minimums = [
            (SPECIAL_CHARSET, MIN_SPECIAL_CHARS),
            (DIGIT_CHARSET, if policy.include_digits { MIN_DIGIT_CHARS } else { 0 }),
            (
                UPPERCASE_CHARSET,
                if policy.include_uppercase { MIN_UPPERCASE_CHARS } else { 0 },
            ),
            (
                LOWERCASE_CHARSET,
                if policy.include_lowercase || letters_only { MIN_LOWERCASE_CHARS } else { 0 },
            ),
        ];

        let mut chars: Vec<char> = Vec::with_capacity(target);
        for (charset, count) in class_minimums {
            for _ in 0..count {
                chars.push(pick(&mut rng, charset));
            }
        }

        let alphabet: String = [LOWERCASE_CHARSET, UPPERCASE_CHARSET, SPECIAL_CHARSET, DIGIT_CHARSET].concat();
        let remaining = target.saturating_sub(chars.len());
        for _ in 0..remaining {
            chars.push(pick(&mut rng, &alphabet));
        }

        secure_shuffle(&mut rng, &mut chars);
        chars.into_iter().collect()
    }

    /// Uniform decimal code in `[10^(d-1), 10^d - 1]`, so always exactly `d` digits.
    pub fn generate_otp(&self) -> String {
        let min = 10u64.pow(self.otp.digits - 1);
        let max = 10u64.pow(self.otp.digits) - 1;
        OsRng.gen_range(min..=max).to_string()
    }
}

// Case counts only for letters; `char::is_uppercase` alone also admits
// symbols such as circled letters.
fn is_uppercase_letter(c: char) -> bool {
    c.is_uppercase() && c.is_alphabetic() && !is_enclosed(c)
}

fn is_lowercase_letter(c: char) -> bool {
    c.is_lowercase() && c.is_alphabetic() && !is_enclosed(c)
}

/// Enclosed alphanumerics (circled and parenthesized letters) are symbols.
fn is_enclosed(c: char) -> bool {
    matches!(c, '\u{2460}'..='\u{24FF}' | '\u{1F130}'..='\u{1F189}')
}

fn pick<R: Rng + CryptoRng>(rng: &mut R, charset: &str) -> char {
    let bytes = charset.as_bytes();
    bytes[rng.gen_range(0..bytes.len())] as char
}

/// Fisher–Yates: walk from the end, swap each slot with a uniform index in `[0, i]`.
fn secure_shuffle<R: Rng + CryptoRng, T>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(policy: PasswordPolicy) -> SecretGenerator {
        SecretGenerator::new(policy, OtpPolicy::default()).unwrap()
    }

    fn all_policies() -> Vec<PasswordPolicy> {
        let mut policies = Vec::new();
        for min_length in [0, 1, 4, 8, 11, 32] {
            for mask in 0u8..16 {
                policies.push(PasswordPolicy {
                    min_length,
                    include_chars: mask & 1 != 0,
                    include_digits: mask & 2 != 0,
                    include_uppercase: mask & 4 != 0,
                    include_lowercase: mask & 8 != 0,
                });
            }
        }
        policies
    }

    // ── check_password ─────────────────────────────────────────────────

    #[test]
    fn test_check_password_accepts_compliant() {
        let gen = generator(PasswordPolicy::default());
        assert!(gen.check_password("Abcdef12"));
    }

    #[test]
    fn test_check_password_too_short() {
        let gen = generator(PasswordPolicy::default());
        assert_eq!(
            gen.validate_password("Ab1"),
            Err(PasswordPolicyError::TooShort(8))
        );
    }

    #[test]
    fn test_check_password_missing_classes() {
        let gen = generator(PasswordPolicy::default());
        assert_eq!(gen.validate_password("12345678"), Err(PasswordPolicyError::MissingLetter));
        assert_eq!(gen.validate_password("Abcdefgh"), Err(PasswordPolicyError::MissingDigit));
        assert_eq!(gen.validate_password("ABCDEF12"), Err(PasswordPolicyError::MissingLowercase));
        assert_eq!(gen.validate_password("abcdef12"), Err(PasswordPolicyError::MissingUppercase));
    }

    #[test]
    fn test_disabled_rules_are_not_checked() {
        let gen = generator(PasswordPolicy {
            min_length: 4,
            include_chars: false,
            include_digits: false,
            include_uppercase: false,
            include_lowercase: false,
        });
        assert!(gen.check_password("!!!!"));
        assert!(!gen.check_password("!!!"));
    }

    // ── generate_password ──────────────────────────────────────────────

    #[test]
    fn test_generated_password_passes_its_own_policy() {
        for policy in all_policies() {
            let gen = generator(policy.clone());
            for _ in 0..20 {
                let password = gen.generate_password();
                assert!(
                    gen.check_password(&password),
                    "policy {:?} rejected generated password {:?}",
                    policy,
                    password
                );
                assert!(password.chars().count() >= policy.min_length);
            }
        }
    }

    #[test]
    fn test_generated_length_is_min_plus_two_when_minimums_fit() {
        let gen = generator(PasswordPolicy {
            min_length: 20,
            ..PasswordPolicy::default()
        });
        assert_eq!(gen.generate_password().chars().count(), 22);
    }

    #[test]
    fn test_generated_length_grows_to_class_minimums() {
        // 2 special + 3 digits + 3 upper + 3 lower exceed 4 + 2.
        let gen = generator(PasswordPolicy {
            min_length: 4,
            ..PasswordPolicy::default()
        });
        assert_eq!(gen.generate_password().chars().count(), 11);
    }

    #[test]
    fn test_generated_passwords_differ() {
        let gen = generator(PasswordPolicy::default());
        assert_ne!(gen.generate_password(), gen.generate_password());
    }

    #[test]
    fn test_shuffle_has_no_positional_bias() {
        // With min_length 9 every password is exactly the 11 class-minimum
        // characters, two of them special. Before shuffling the specials sit
        // at positions 0 and 1; afterwards each position should hold a
        // special about 2/11 of the time.
        let gen = generator(PasswordPolicy {
            min_length: 9,
            ..PasswordPolicy::default()
        });
        let rounds = 2000;
        let mut special_counts = [0usize; 11];
        for _ in 0..rounds {
            let password: Vec<char> = gen.generate_password().chars().collect();
            assert_eq!(password.len(), 11);
            for (i, c) in password.iter().enumerate() {
                if SPECIAL_CHARSET.contains(*c) {
                    special_counts[i] += 1;
                }
            }
        }
        for (i, count) in special_counts.iter().enumerate() {
            let share = *count as f64 / rounds as f64;
            assert!(
                (0.10..0.27).contains(&share),
                "position {} holds a special character {:.3} of the time",
                i,
                share
            );
        }
    }

    #[test]
    fn test_secure_shuffle_is_a_permutation() {
        let mut items: Vec<u32> = (0..50).collect();
        secure_shuffle(&mut OsRng, &mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<u32>>());
    }

    // ── generate_otp ───────────────────────────────────────────────────

    #[test]
    fn test_otp_has_exact_digit_count_and_range() {
        for digits in [1, 4, 6, 9, MAX_OTP_DIGITS] {
            let gen = SecretGenerator::new(PasswordPolicy::default(), OtpPolicy { digits }).unwrap();
            let min = 10u64.pow(digits - 1);
            let max = 10u64.pow(digits) - 1;
            for _ in 0..200 {
                let otp = gen.generate_otp();
                assert_eq!(otp.len(), digits as usize);
                assert!(otp.chars().all(|c| c.is_ascii_digit()));
                let value: u64 = otp.parse().unwrap();
                assert!((min..=max).contains(&value));
            }
        }
    }

    #[test]
    fn test_case_rules_ignore_enclosed_letters() {
        let gen = generator(PasswordPolicy::default());
        // Circled letters carry a case property but are not letters.
        assert_eq!(
            gen.validate_password("\u{24B6}bcdefg1"),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            gen.validate_password("\u{24D0}BCDEFG1"),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert!(gen.check_password("\u{00C9}t\u{00E9}ssss1"));
    }

    #[test]
    fn test_digit_rule_is_ascii_only() {
        let gen = generator(PasswordPolicy::default());
        // Arabic-Indic digits do not satisfy the digit rule.
        assert_eq!(
            gen.validate_password("Abcdefg\u{0661}"),
            Err(PasswordPolicyError::MissingDigit)
        );
    }

    #[test]
    fn test_min_length_upper_bound() {
        let at_max = PasswordPolicy {
            min_length: MAX_PASSWORD_MIN_LENGTH,
            ..PasswordPolicy::default()
        };
        let gen = generator(at_max.clone());
        let password = gen.generate_password();
        assert_eq!(password.chars().count(), MAX_PASSWORD_MIN_LENGTH + PASSWORD_EXTRA_LENGTH);
        assert!(gen.check_password(&password));

        for min_length in [MAX_PASSWORD_MIN_LENGTH + 1, usize::MAX] {
            let result = SecretGenerator::new(
                PasswordPolicy {
                    min_length,
                    ..at_max.clone()
                },
                OtpPolicy::default(),
            );
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "min_length={}", min_length);
        }
    }

    #[test]
    fn test_otp_digits_out_of_range_refused() {
        assert!(SecretGenerator::new(PasswordPolicy::default(), OtpPolicy { digits: 0 }).is_err());
        assert!(SecretGenerator::new(
            PasswordPolicy::default(),
            OtpPolicy {
                digits: MAX_OTP_DIGITS + 1
            }
        )
        .is_err());
    }
}
