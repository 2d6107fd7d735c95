//! Package config - validation variants grouped under one base package code

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::error::{ErrorKind, FieldPath, Violation};
use crate::core::selection::{PackageCodeParts, SelectionError, SelectionMask, BASE_LEN};
use crate::entities::variant::ValidationVariant;

/// Variants for one 8-character base package code and one selection mask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub package8digit: String,
    pub selection_code: SelectionMask,
    #[serde(default)]
    pub data_with_selection_code: Vec<ValidationVariant>,
}

impl PackageConfig {
    pub fn new(package8digit: impl Into<String>, selection_code: SelectionMask) -> Self {
        Self {
            package8digit: package8digit.into(),
            selection_code,
            data_with_selection_code: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: ValidationVariant) -> Self {
        self.data_with_selection_code.push(variant);
        self
    }

    /// Structural checks plus identifier uniqueness within this package
    pub fn check(&self, path: &FieldPath) -> Vec<Violation> {
        let mut violations = Vec::new();
        check_package8digit(path.field("package8digit"), &self.package8digit, &mut violations);

        let list_path = path.field("data_with_selection_code");
        if self.data_with_selection_code.is_empty() {
            violations.push(empty_config(list_path.clone()));
        }
        for (i, variant) in self.data_with_selection_code.iter().enumerate() {
            violations.extend(variant.check(&list_path.index(i)));
        }

        let codes = self
            .data_with_selection_code
            .iter()
            .map(|v| v.package_selection_code.as_str());
        if let Some(v) = check_unique_selection_codes(codes, &list_path) {
            violations.push(v);
        }

        violations
    }

    /// Look up a variant by its package-selection identifier
    pub fn variant(&self, package_selection_code: &str) -> Option<&ValidationVariant> {
        self.data_with_selection_code
            .iter()
            .find(|v| v.package_selection_code == package_selection_code)
    }

    /// Derive the identifier this package's mask produces for `code15`
    pub fn selection_code_for(&self, code15: &str) -> Result<String, SelectionError> {
        Ok(PackageCodeParts::parse(code15)?.selection_code(self.selection_code))
    }

    /// The variant that applies to `code15`, if the code belongs to this package
    pub fn resolve(&self, code15: &str) -> Result<Option<&ValidationVariant>, SelectionError> {
        let parts = PackageCodeParts::parse(code15)?;
        if parts.base != self.package8digit {
            return Ok(None);
        }
        Ok(self.variant(&parts.selection_code(self.selection_code)))
    }
}

pub(crate) fn empty_config(path: FieldPath) -> Violation {
    Violation::new(
        ErrorKind::EmptyConfig,
        path,
        "at least one validation variant is required",
    )
}

/// `package8digit` must be exactly 8 characters
pub(crate) fn check_package8digit(path: FieldPath, value: &str, out: &mut Vec<Violation>) {
    let len = value.chars().count();
    if value.trim().is_empty() {
        out.push(Violation::empty(path));
    } else if len != BASE_LEN {
        out.push(Violation::new(
            ErrorKind::InvalidLength,
            path,
            format!("'{}' must be exactly {} characters, got {}", value, BASE_LEN, len),
        ));
    }
}

/// Index and value of the first identifier that repeats an earlier one
///
/// Blank values are skipped; they are reported as empty fields instead.
pub(crate) fn first_repeat<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<(usize, &'a str)> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .enumerate()
        .filter(|(_, value)| !value.trim().is_empty())
        .find(|(_, value)| !seen.insert(*value))
}

/// Stop at the first repeated package-selection identifier
pub(crate) fn check_unique_selection_codes<'a>(
    codes: impl IntoIterator<Item = &'a str>,
    list_path: &FieldPath,
) -> Option<Violation> {
    first_repeat(codes).map(|(i, code)| {
        Violation::new(
            ErrorKind::DuplicatePackageSelectionCode,
            list_path.index(i).field("package_selection_code"),
            format!("package_selection_code '{}' appears more than once", code),
        )
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::variant::tests::sample_variant;

    pub(crate) fn sample_package(package8digit: &str) -> PackageConfig {
        PackageConfig::new(package8digit, SelectionMask::BASE_ONLY)
            .with_variant(sample_variant(package8digit))
    }

    #[test]
    fn test_valid_package() {
        assert!(sample_package("SOICW16U").check(&FieldPath::root()).is_empty());
    }

    #[test]
    fn test_wrong_package8digit_length() {
        for code in ["SOIC16", "SOICW16UX"] {
            let violations = sample_package(code).check(&FieldPath::root());
            assert_eq!(violations.len(), 1, "{code}");
            assert_eq!(violations[0].kind, ErrorKind::InvalidLength);
            assert_eq!(violations[0].path.to_string(), "package8digit");
        }
    }

    #[test]
    fn test_empty_variant_list() {
        let package = PackageConfig::new("SOICW16U", SelectionMask::BASE_ONLY);
        let violations = package.check(&FieldPath::root());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ErrorKind::EmptyConfig);
    }

    #[test]
    fn test_duplicate_selection_code_names_value() {
        let package = PackageConfig::new("SOICW16U", SelectionMask::ALL)
            .with_variant(sample_variant("SOICW16UAB11"))
            .with_variant(sample_variant("SOICW16UAB12"))
            .with_variant(sample_variant("SOICW16UAB11"));
        let violations = package.check(&FieldPath::root().field("config").index(0));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ErrorKind::DuplicatePackageSelectionCode);
        assert!(violations[0].detail.contains("SOICW16UAB11"));
        assert_eq!(
            violations[0].path.to_string(),
            "config[0].data_with_selection_code[2].package_selection_code"
        );
    }

    #[test]
    fn test_duplicate_detected_in_either_order() {
        let a = sample_variant("SOICW16UA");
        let b = sample_variant("SOICW16UB");
        for order in [vec![a.clone(), b.clone(), a.clone()], vec![a.clone(), a.clone(), b.clone()]] {
            let mut package = PackageConfig::new("SOICW16U", SelectionMask::ALL);
            package.data_with_selection_code = order;
            let violations = package.check(&FieldPath::root());
            assert!(violations
                .iter()
                .any(|v| v.kind == ErrorKind::DuplicatePackageSelectionCode));
        }
    }

    #[test]
    fn test_only_first_repeat_reported() {
        assert_eq!(first_repeat(["A", "B", "A", "B"]), Some((2, "A")));
        assert_eq!(first_repeat(["A", "B", "C"]), None);
        assert_eq!(first_repeat(["", ""]), None);
    }

    #[test]
    fn test_resolve() {
        let package = PackageConfig::new("SOICW16U", "1100".parse().unwrap())
            .with_variant(sample_variant("SOICW16UA"));

        let found = package.resolve("SOICW16U0001AB1").unwrap();
        assert_eq!(found.map(|v| v.package_selection_code.as_str()), Some("SOICW16UA"));

        assert!(package.resolve("SOICW16U0001BB1").unwrap().is_none());
        assert!(package.resolve("QFNXX32A0001AB1").unwrap().is_none());
        assert!(package.resolve("SOIC").is_err());
        assert_eq!(package.selection_code_for("SOICW16U0001AB1").unwrap(), "SOICW16UA");
    }
}
