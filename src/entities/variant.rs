//! Validation variant - the leaf rule keyed by a package-selection identifier

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::{ErrorKind, FieldPath, Violation};
use crate::core::selection::{derive_with_mask, SelectionError, SelectionMask};

/// Which fields a downstream matcher treats as authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidateType {
    Recipe,
    ToolId,
}

impl ValidateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidateType::Recipe => "recipe",
            ValidateType::ToolId => "tool_id",
        }
    }
}

impl std::fmt::Display for ValidateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValidateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recipe" => Ok(ValidateType::Recipe),
            "tool_id" => Ok(ValidateType::ToolId),
            _ => Err(format!(
                "Invalid validate type: '{}'. Use recipe or tool_id",
                s
            )),
        }
    }
}

/// Toggles for which fields take part in a lot match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchOptions {
    pub use_operation_code: bool,
    pub use_on_operation: bool,
    pub use_lot_hold: bool,
}

impl MatchOptions {
    /// Key names, in document order
    pub const KEYS: [&'static str; 3] = ["use_operation_code", "use_on_operation", "use_lot_hold"];
}

/// One of the four physical tool slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolPosition {
    #[serde(rename = "position_1")]
    Position1,
    #[serde(rename = "position_2")]
    Position2,
    #[serde(rename = "position_3")]
    Position3,
    #[serde(rename = "position_4")]
    Position4,
}

impl ToolPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolPosition::Position1 => "position_1",
            ToolPosition::Position2 => "position_2",
            ToolPosition::Position3 => "position_3",
            ToolPosition::Position4 => "position_4",
        }
    }

    pub fn all() -> &'static [ToolPosition] {
        &[
            ToolPosition::Position1,
            ToolPosition::Position2,
            ToolPosition::Position3,
            ToolPosition::Position4,
        ]
    }
}

impl std::fmt::Display for ToolPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolPosition::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown tool position: '{}'", s))
    }
}

/// Allowed tool ids per tool position
///
/// An absent or empty list records no restriction for that position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowToolIds(BTreeMap<ToolPosition, Vec<String>>);

impl AllowToolIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any list already at `position`
    pub fn with(mut self, position: ToolPosition, ids: Vec<String>) -> Self {
        self.0.insert(position, ids);
        self
    }

    pub fn set(&mut self, position: ToolPosition, ids: Vec<String>) {
        self.0.insert(position, ids);
    }

    pub fn get(&self, position: ToolPosition) -> &[String] {
        self.0.get(&position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when the position carries a non-empty allow-list
    pub fn is_restricted(&self, position: ToolPosition) -> bool {
        !self.get(position).is_empty()
    }

    /// Whether `tool_id` is acceptable at `position`
    pub fn permits(&self, position: ToolPosition, tool_id: &str) -> bool {
        let allowed = self.get(position);
        allowed.is_empty() || allowed.iter().any(|id| id == tool_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ToolPosition, &[String])> {
        self.0.iter().map(|(p, ids)| (*p, ids.as_slice()))
    }
}

/// Tagged view of the fields that matter for a variant's validate type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule<'a> {
    Recipe {
        recipe_name: &'a str,
        product_name: &'a str,
    },
    ToolId {
        allow: &'a AllowToolIds,
    },
}

/// Validation variant for one package-selection identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVariant {
    pub package_selection_code: String,
    pub operation_code: String,
    pub on_operation: String,
    pub validate_type: ValidateType,
    pub recipe_name: String,
    pub product_name: String,
    pub options: MatchOptions,
    #[serde(default)]
    pub allow_tool_id: AllowToolIds,
}

impl ValidationVariant {
    /// The authoritative fields for this variant's validate type
    pub fn rule(&self) -> MatchRule<'_> {
        match self.validate_type {
            ValidateType::Recipe => MatchRule::Recipe {
                recipe_name: &self.recipe_name,
                product_name: &self.product_name,
            },
            ValidateType::ToolId => MatchRule::ToolId {
                allow: &self.allow_tool_id,
            },
        }
    }

    /// Report every empty text field; `path` points at this variant
    pub fn check(&self, path: &FieldPath) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (field, value) in self.text_fields() {
            check_text(path.field(field), value, &mut violations);
        }
        violations
    }

    /// Whether this variant's identifier is what `mask` derives from `code15`
    pub fn matches_source(&self, code15: &str, mask: SelectionMask) -> Result<bool, SelectionError> {
        Ok(derive_with_mask(code15, mask)? == self.package_selection_code)
    }

    fn text_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("package_selection_code", self.package_selection_code.as_str()),
            ("operation_code", self.operation_code.as_str()),
            ("on_operation", self.on_operation.as_str()),
            ("recipe_name", self.recipe_name.as_str()),
            ("product_name", self.product_name.as_str()),
        ]
    }
}

/// Push an `EmptyField` violation when `value` is blank
pub(crate) fn check_text(path: FieldPath, value: &str, out: &mut Vec<Violation>) {
    if value.trim().is_empty() {
        out.push(Violation::empty(path));
    }
}

/// Report a variant whose identifier is not the codec output for `code15`
pub fn check_source_code(
    variant: &ValidationVariant,
    mask: SelectionMask,
    code15: &str,
    path: &FieldPath,
) -> Option<Violation> {
    let field = path.field("package_selection_code");
    match derive_with_mask(code15, mask) {
        Ok(expected) if expected == variant.package_selection_code => None,
        Ok(expected) => Some(Violation::new(
            ErrorKind::SelectionCodeMismatch,
            field,
            format!(
                "'{}' does not match '{}' derived from {} with mask {}",
                variant.package_selection_code, expected, code15, mask
            ),
        )),
        Err(err) => Some(Violation::selection(field, &err)),
    }
}
