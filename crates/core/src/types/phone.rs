//! Phone numbers in the three-part form the account screens use.
//!
//! Profiles store a phone as country code (`+58`), carrier prefix (`0412`)
//! and subscriber number (`5002930`). Backends usually hand back a single
//! string, so [`PhoneNumber::split`] breaks one apart.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Country code used when a phone string carries none.
pub const DEFAULT_COUNTRY_CODE: &str = "+58";

/// Carrier prefix used when a phone string carries none.
pub const DEFAULT_PREFIX: &str = "0412";

/// Length of a subscriber number.
pub const SUBSCRIBER_DIGITS: usize = 7;

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains no digits.
    #[error("phone number cannot be empty")]
    Empty,
    /// Fewer digits than a subscriber number needs.
    #[error("phone number must have at least {min} digits")]
    TooShort {
        /// Minimum digit count.
        min: usize,
    },
    /// Letters or other symbols mixed into the number.
    #[error("phone number contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A phone number split into its display parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Country calling code including the plus sign.
    pub country_code: String,
    /// Carrier or area prefix in national format.
    pub prefix: String,
    /// Subscriber number.
    pub number: String,
}

impl PhoneNumber {
    /// Strictly parse user input, as typed into the login identifier field.
    ///
    /// Accepts digits, spaces, dashes, parentheses and a leading `+`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no digits, fewer than seven digits,
    /// or characters other than the accepted separators.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        for (i, c) in s.char_indices() {
            let allowed = c.is_ascii_digit()
                || matches!(c, ' ' | '-' | '(' | ')')
                || (c == '+' && i == 0);
            if !allowed {
                return Err(PhoneError::InvalidCharacter(c));
            }
        }

        let digit_count = s.chars().filter(char::is_ascii_digit).count();
        if digit_count == 0 {
            return Err(PhoneError::Empty);
        }
        if digit_count < SUBSCRIBER_DIGITS {
            return Err(PhoneError::TooShort {
                min: SUBSCRIBER_DIGITS,
            });
        }

        Ok(Self::split(s))
    }

    /// Leniently split a backend phone string into parts.
    ///
    /// - A leading `+` token of one to three digits followed by whitespace is
    ///   the country code; a compact `+` number longer than ten digits keeps
    ///   its last ten digits as the national part. Otherwise `+58`.
    /// - The last seven digits are the subscriber number.
    /// - Up to four digits before them are the prefix, with a national `0`
    ///   restored when only three are present. Otherwise `0412`.
    /// - Fewer than seven digits: the digits become the number as-is.
    #[must_use]
    pub fn split(raw: &str) -> Self {
        let raw = raw.trim();
        let (country_code, national) = split_country_code(raw);

        if national.len() < SUBSCRIBER_DIGITS {
            return Self {
                country_code,
                prefix: DEFAULT_PREFIX.to_owned(),
                number: national,
            };
        }

        let (head, number) = national.split_at(national.len() - SUBSCRIBER_DIGITS);
        let prefix = match head.len() {
            0 => DEFAULT_PREFIX.to_owned(),
            3 => format!("0{head}"),
            n if n > 4 => head.split_at(n - 4).1.to_owned(),
            _ => head.to_owned(),
        };

        Self {
            country_code,
            prefix,
            number: number.to_owned(),
        }
    }

    /// National format, e.g. `0412-5002930`.
    #[must_use]
    pub fn national(&self) -> String {
        format!("{}-{}", self.prefix, self.number)
    }

    /// E.164 form for identity providers, e.g. `+584125002930`.
    ///
    /// The national trunk `0` is dropped from the prefix.
    #[must_use]
    pub fn e164(&self) -> String {
        format!(
            "{}{}{}",
            self.country_code,
            self.prefix.trim_start_matches('0'),
            self.number
        )
    }
}

impl Default for PhoneNumber {
    fn default() -> Self {
        Self {
            country_code: DEFAULT_COUNTRY_CODE.to_owned(),
            prefix: DEFAULT_PREFIX.to_owned(),
            number: String::new(),
        }
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.country_code, self.prefix, self.number)
    }
}

/// Separate the country code from the national digits.
fn split_country_code(raw: &str) -> (String, String) {
    let Some(rest) = raw.strip_prefix('+') else {
        return (DEFAULT_COUNTRY_CODE.to_owned(), digits(raw));
    };

    let first = rest.split_whitespace().next().unwrap_or("");
    let first_digits = digits(first);
    let separated = rest.trim_start().len() > first.len();
    if separated && (1..=3).contains(&first_digits.len()) {
        let national = rest.trim_start().split_at(first.len()).1;
        return (format!("+{first_digits}"), digits(national));
    }

    let all = digits(rest);
    if all.len() > 10 {
        let (code, national) = all.split_at(all.len() - 10);
        (format!("+{code}"), national.to_owned())
    } else {
        (DEFAULT_COUNTRY_CODE.to_owned(), all)
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parts(p: &PhoneNumber) -> (&str, &str, &str) {
        (&p.country_code, &p.prefix, &p.number)
    }

    #[test]
    fn test_split_national() {
        let p = PhoneNumber::split("04125002930");
        assert_eq!(parts(&p), ("+58", "0412", "5002930"));
    }

    #[test]
    fn test_split_with_separators() {
        let p = PhoneNumber::split("0414-123.45.67");
        assert_eq!(parts(&p), ("+58", "0414", "1234567"));
    }

    #[test]
    fn test_split_explicit_country_code() {
        let p = PhoneNumber::split("+1 305 5550123");
        assert_eq!(parts(&p), ("+1", "0305", "5550123"));
    }

    #[test]
    fn test_split_compact_international() {
        let p = PhoneNumber::split("+584125002930");
        assert_eq!(parts(&p), ("+58", "0412", "5002930"));
    }

    #[test]
    fn test_split_number_only() {
        let p = PhoneNumber::split("5002930");
        assert_eq!(parts(&p), ("+58", "0412", "5002930"));
    }

    #[test]
    fn test_split_short_keeps_digits() {
        let p = PhoneNumber::split("12345");
        assert_eq!(parts(&p), ("+58", "0412", "12345"));
    }

    #[test]
    fn test_parse_rejects_letters_and_short_input() {
        assert_eq!(
            PhoneNumber::parse("0412-CALL-ME"),
            Err(PhoneError::InvalidCharacter('C'))
        );
        assert_eq!(
            PhoneNumber::parse("123"),
            Err(PhoneError::TooShort { min: 7 })
        );
        assert_eq!(PhoneNumber::parse(" - "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_display_and_national() {
        let p = PhoneNumber::parse("0412 5002930").unwrap();
        assert_eq!(p.to_string(), "+58 0412 5002930");
        assert_eq!(p.national(), "0412-5002930");
        assert_eq!(p.e164(), "+584125002930");
    }
}
