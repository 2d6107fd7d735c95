//! Selection codec - package-selection identifiers from 15-character package codes
//!
//! A package code is laid out as:
//!
//! ```text
//! SOICW16U 0001 A B1 ...
//! |------| |--| | |-|
//!  base    seq  | depopulate pin (13..15)
//!               special mold (12)
//! ```
//!
//! The plate type is read from the last character (14), which overlaps the
//! second depopulate-pin character. The identifier is always the 8-character
//! base followed by whichever optional segments the selection mask enables.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

/// Required length of a full package code
pub const PACKAGE_CODE_LEN: usize = 15;

/// Length of the base package segment (`package8digit`)
pub const BASE_LEN: usize = 8;

/// Required length of a selection mask
pub const MASK_LEN: usize = 4;

const BASE: Range<usize> = 0..BASE_LEN;
const SEQUENCE: Range<usize> = BASE_LEN..12;
const SPECIAL_MOLD: usize = 12;
const DEPOPULATE_PIN: Range<usize> = 13..15;
const PLATE_TYPE: usize = 14;

/// Errors raised for malformed codec input
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SelectionError {
    #[error("package code must be exactly 15 characters, got {actual}")]
    #[diagnostic(code(lotguard::selection::invalid_length))]
    InvalidLength { actual: usize },

    #[error("selection mask '{mask}' must be exactly 4 digits of '0' or '1'")]
    #[diagnostic(
        code(lotguard::selection::invalid_mask),
        help("digits: base package, special mold, depopulate pin, plate type (e.g. 1010)")
    )]
    InvalidMask { mask: String },
}

/// A 4-bit selection mask, written as four `'0'`/`'1'` digits
///
/// Digit order: base package, special mold, depopulate pin, plate type.
/// The base digit is advisory only: derivation always includes the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SelectionMask([bool; MASK_LEN]);

impl SelectionMask {
    /// Only the base package (`1000`)
    pub const BASE_ONLY: SelectionMask = SelectionMask([true, false, false, false]);

    /// Every segment enabled (`1111`)
    pub const ALL: SelectionMask = SelectionMask([true, true, true, true]);

    pub fn new(bits: [bool; MASK_LEN]) -> Self {
        Self(bits)
    }

    /// Parse a mask string, which must match `^[01]{4}$`
    pub fn parse(s: &str) -> Result<Self, SelectionError> {
        let invalid = || SelectionError::InvalidMask {
            mask: s.to_string(),
        };

        if s.chars().count() != MASK_LEN {
            return Err(invalid());
        }

        let mut bits = [false; MASK_LEN];
        for (bit, ch) in bits.iter_mut().zip(s.chars()) {
            *bit = match ch {
                '0' => false,
                '1' => true,
                _ => return Err(invalid()),
            };
        }

        Ok(Self(bits))
    }

    pub fn bits(&self) -> [bool; MASK_LEN] {
        self.0
    }

    /// Documented as "use base package"; derivation ignores it
    pub fn uses_base(&self) -> bool {
        self.0[0]
    }

    pub fn uses_special_mold(&self) -> bool {
        self.0[1]
    }

    pub fn uses_depopulate_pin(&self) -> bool {
        self.0[2]
    }

    pub fn uses_plate_type(&self) -> bool {
        self.0[3]
    }
}

impl fmt::Display for SelectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for SelectionMask {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SelectionMask {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SelectionMask {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 15-character package code split into its named segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageCodeParts {
    /// Positions 1-8, the `package8digit`
    pub base: String,
    /// Positions 9-12, not used by derivation
    pub sequence: String,
    pub special_mold: char,
    pub depopulate_pin: String,
    pub plate_type: char,
}

impl PackageCodeParts {
    /// Split a package code, failing with `InvalidLength` unless it has 15 characters
    pub fn parse(code15: &str) -> Result<Self, SelectionError> {
        let chars: Vec<char> = code15.chars().collect();
        if chars.len() != PACKAGE_CODE_LEN {
            return Err(SelectionError::InvalidLength {
                actual: chars.len(),
            });
        }

        Ok(Self {
            base: chars[BASE].iter().collect(),
            sequence: chars[SEQUENCE].iter().collect(),
            special_mold: chars[SPECIAL_MOLD],
            depopulate_pin: chars[DEPOPULATE_PIN].iter().collect(),
            plate_type: chars[PLATE_TYPE],
        })
    }

    /// Build the package-selection identifier for the given mask
    pub fn selection_code(&self, mask: SelectionMask) -> String {
        let mut out = String::with_capacity(BASE_LEN + 4);
        out.push_str(&self.base);
        if mask.uses_special_mold() {
            out.push(self.special_mold);
        }
        if mask.uses_depopulate_pin() {
            out.push_str(&self.depopulate_pin);
        }
        if mask.uses_plate_type() {
            out.push(self.plate_type);
        }
        out
    }
}

impl fmt::Display for PackageCodeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base={} seq={} mold={} pin={} plate={}",
            self.base, self.sequence, self.special_mold, self.depopulate_pin, self.plate_type
        )
    }
}

/// Derive the package-selection identifier from a package code and a mask string
pub fn derive_package_selection_code(code15: &str, mask: &str) -> Result<String, SelectionError> {
    let parts = PackageCodeParts::parse(code15)?;
    let mask = SelectionMask::parse(mask)?;
    Ok(parts.selection_code(mask))
}

/// Derive the identifier with an already-parsed mask
pub fn derive_with_mask(code15: &str, mask: SelectionMask) -> Result<String, SelectionError> {
    Ok(PackageCodeParts::parse(code15)?.selection_code(mask))
}

/// Inverse view of a package code, for diagnostics
pub fn decompose(code15: &str) -> Result<PackageCodeParts, SelectionError> {
    PackageCodeParts::parse(code15)
}
