//! Equipment config - the top-level per-equipment record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::error::{ErrorKind, FieldPath, Violation};
use crate::core::identity::ConfigId;
use crate::core::selection::{PackageCodeParts, SelectionError};
use crate::entities::package::PackageConfig;
use crate::entities::variant::{check_text, ValidationVariant};

/// All package configurations for one piece of equipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentConfig {
    /// Unique identifier (EQP-xxx)
    pub id: ConfigId,

    /// Equipment name, unique across the store
    pub equipment_name: String,

    /// Package configurations, in display order
    #[serde(default)]
    pub config: Vec<PackageConfig>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last replacement timestamp
    pub updated: DateTime<Utc>,

    /// Incremented on every update
    #[serde(default = "default_revision")]
    pub revision: u32,
}

fn default_revision() -> u32 {
    1
}

impl EquipmentConfig {
    /// Create a new record with a fresh id
    pub fn new(equipment_name: String, config: Vec<PackageConfig>) -> Self {
        let now = Utc::now();
        Self {
            id: ConfigId::new(),
            equipment_name,
            config,
            created: now,
            updated: now,
            revision: 1,
        }
    }

    /// Find a package config by its base code
    pub fn package(&self, package8digit: &str) -> Option<&PackageConfig> {
        self.config.iter().find(|p| p.package8digit == package8digit)
    }

    pub fn variant_count(&self) -> usize {
        self.config
            .iter()
            .map(|p| p.data_with_selection_code.len())
            .sum()
    }

    /// Find the package and variant that apply to a 15-character package code
    ///
    /// Read-only lookup; it makes no accept/hold decision.
    pub fn resolve_variant(
        &self,
        code15: &str,
    ) -> Result<Option<(&PackageConfig, &ValidationVariant)>, SelectionError> {
        let parts = PackageCodeParts::parse(code15)?;
        Ok(self.package(&parts.base).and_then(|package| {
            package
                .variant(&parts.selection_code(package.selection_code))
                .map(|variant| (package, variant))
        }))
    }

    /// Every invariant that can be checked without looking at other records
    pub fn check(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        check_equipment_name(&self.equipment_name, &mut violations);
        violations.extend(check_unique_packages(&self.config));
        violations.extend(check_packages(&self.config));
        violations
    }
}

pub(crate) fn check_equipment_name(name: &str, out: &mut Vec<Violation>) {
    check_text(FieldPath::root().field("equipment_name"), name, out);
}

/// One violation per repeated `package8digit` value, at its first repeat
pub fn check_unique_packages(config: &[PackageConfig]) -> Vec<Violation> {
    check_unique_package_codes(
        config
            .iter()
            .enumerate()
            .map(|(i, package)| (i, package.package8digit.as_str())),
    )
}

/// Same as [`check_unique_packages`] over `(index, package8digit)` pairs
pub(crate) fn check_unique_package_codes<'a>(
    codes: impl IntoIterator<Item = (usize, &'a str)>,
) -> Vec<Violation> {
    let list_path = FieldPath::root().field("config");
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut violations = Vec::new();

    for (i, code) in codes {
        if code.trim().is_empty() {
            continue;
        }
        if !seen.insert(code) && reported.insert(code) {
            violations.push(Violation::new(
                ErrorKind::DuplicatePackage8Digit,
                list_path.index(i).field("package8digit"),
                format!("package8digit '{}' appears more than once", code),
            ));
        }
    }

    violations
}

/// Structural checks of every package config, with `config[i]` paths
pub fn check_packages(config: &[PackageConfig]) -> Vec<Violation> {
    let list_path = FieldPath::root().field("config");
    config
        .iter()
        .enumerate()
        .flat_map(|(i, package)| package.check(&list_path.index(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::SelectionMask;
    use crate::entities::package::tests::sample_package;
    use crate::entities::variant::tests::sample_variant;

    #[test]
    fn test_equipment_creation() {
        let eqp = EquipmentConfig::new("TNF-61".to_string(), vec![sample_package("SOICW16U")]);
        assert!(eqp.id.to_string().starts_with("EQP-"));
        assert_eq!(eqp.revision, 1);
        assert_eq!(eqp.created, eqp.updated);
        assert!(eqp.check().is_empty());
        assert_eq!(eqp.variant_count(), 1);
    }

    #[test]
    fn test_blank_name_rejected() {
        let eqp = EquipmentConfig::new(" ".to_string(), Vec::new());
        let violations = eqp.check();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ErrorKind::EmptyField);
        assert_eq!(violations[0].path.to_string(), "equipment_name");
    }

    #[test]
    fn test_duplicate_package8digit() {
        let config = vec![
            sample_package("SOICW16U"),
            sample_package("QFNXX32A"),
            sample_package("SOICW16U"),
            sample_package("QFNXX32A"),
            sample_package("SOICW16U"),
        ];
        let violations = check_unique_packages(&config);
        let paths: Vec<String> = violations.iter().map(|v| v.path.to_string()).collect();
        assert_eq!(
            paths,
            vec!["config[2].package8digit", "config[3].package8digit"]
        );
        assert!(violations
            .iter()
            .all(|v| v.kind == ErrorKind::DuplicatePackage8Digit));
    }

    #[test]
    fn test_unique_packages_pass() {
        let config = vec![sample_package("SOICW16U"), sample_package("QFNXX32A")];
        assert!(check_unique_packages(&config).is_empty());
    }

    #[test]
    fn test_resolve_variant() {
        let package = PackageConfig::new("SOICW16U", SelectionMask::ALL)
            .with_variant(sample_variant("SOICW16UAB11"));
        let eqp = EquipmentConfig::new("TNF-61".to_string(), vec![package]);

        let (package, variant) = eqp.resolve_variant("SOICW16U0001AB1").unwrap().unwrap();
        assert_eq!(package.package8digit, "SOICW16U");
        assert_eq!(variant.package_selection_code, "SOICW16UAB11");

        assert!(eqp.resolve_variant("QFNXX32A0001AB1").unwrap().is_none());
        assert!(matches!(
            eqp.resolve_variant("SOIC"),
            Err(SelectionError::InvalidLength { actual: 4 })
        ));
    }

    #[test]
    fn test_equipment_yaml_roundtrip() {
        let eqp = EquipmentConfig::new("TNF-61".to_string(), vec![sample_package("SOICW16U")]);
        let yaml = serde_yml::to_string(&eqp).unwrap();
        assert!(yaml.contains("EQP-"));
        assert!(yaml.contains("selection_code: '1000'") || yaml.contains("selection_code: \"1000\""));
        let parsed: EquipmentConfig = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, eqp);
    }
}
