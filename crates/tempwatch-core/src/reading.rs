//! Reading grammar, unit conversion, and file-content parsing.
//!
//! A reading token is an optional minus sign, one or more ASCII digits,
//! an optional fractional part, and a single unit letter (`C` or `F`,
//! either case). Each parsed token carries both unit representations,
//! each rounded to two decimals after conversion.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::observe::PipelineObserver;

/// Grammar for a single trimmed reading token.
#[allow(clippy::expect_used)]
static READING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?[0-9]+(?:\.[0-9]+)?)([CcFf])$").expect("reading pattern is a valid regex")
});

/// The unit a reading was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    const fn from_letter(letter: &str) -> Option<Self> {
        match letter.as_bytes() {
            [b'C' | b'c'] => Some(Self::Celsius),
            [b'F' | b'f'] => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => f.write_str("C"),
            Self::Fahrenheit => f.write_str("F"),
        }
    }
}

/// A single temperature with both unit representations.
///
/// Serialises as `{"original": .., "celsius": .., "fahrenheit": ..}`,
/// which is the element shape of the real-time channel payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Reading {
    /// The input token, trimmed, case preserved.
    pub original: String,
    /// Value in Celsius, rounded to two decimals.
    pub celsius: f64,
    /// Value in Fahrenheit, rounded to two decimals.
    pub fahrenheit: f64,
}

/// `F = C × 9/5 + 32`
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// `C = (F − 32) × 5/9`
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Round to two decimal places, ties away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Structural check against the reading grammar. No conversion is done.
///
/// The candidate is trimmed before matching.
pub fn is_valid_reading(candidate: &str) -> bool {
    READING_PATTERN.is_match(candidate.trim())
}

/// Parse one token into a [`Reading`], or `None` if it fails the grammar.
pub fn parse_reading(token: &str) -> Option<Reading> {
    let trimmed = token.trim();
    let captures = READING_PATTERN.captures(trimmed)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = TemperatureUnit::from_letter(captures.get(2)?.as_str())?;

    let (celsius, fahrenheit) = match unit {
        TemperatureUnit::Celsius => (value, celsius_to_fahrenheit(value)),
        TemperatureUnit::Fahrenheit => (fahrenheit_to_celsius(value), value),
    };

    Some(Reading {
        original: trimmed.to_owned(),
        celsius: round2(celsius),
        fahrenheit: round2(fahrenheit),
    })
}

/// Parse file content into readings, in line order.
///
/// Blank lines are dropped silently. Lines that fail the grammar are
/// dropped and reported through `observer`; they never stop the
/// remaining lines from being parsed. Duplicates are kept.
pub fn parse_readings(content: &str, observer: &dyn PipelineObserver) -> Vec<Reading> {
    content
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let reading = parse_reading(line);
            if reading.is_none() {
                observer.line_skipped(line);
            }
            reading
        })
        .collect()
}
