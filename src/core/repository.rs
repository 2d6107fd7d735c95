//! Equipment config repository
//!
//! Enforces the cross-record rules (unique equipment names) on top of the
//! per-record checks in [`crate::entities`], and runs every check inside the
//! store's write step so concurrent writers cannot race past them.

use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::core::error::{ConfigError, ValidationReport};
use crate::core::identity::ConfigId;
use crate::core::store::{ConfigStore, Mutation};
use crate::entities::equipment::{check_equipment_name, check_packages, check_unique_packages};
use crate::entities::{EquipmentConfig, PackageConfig};

/// Default rows per page when the caller gives none
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Compare equipment names byte-for-byte; otherwise ignore case
    pub case_sensitive_names: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            case_sensitive_names: true,
        }
    }
}

impl RepositoryOptions {
    /// Whether two equipment names collide under these options
    pub fn same_name(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive_names {
            a == b
        } else {
            a.to_lowercase() == b.to_lowercase()
        }
    }
}

/// Input for [`EquipmentRepository::create`]
#[derive(Debug, Clone)]
pub struct NewEquipmentConfig {
    pub equipment_name: String,
    pub config: Vec<PackageConfig>,
}

/// Input for [`EquipmentRepository::update`]; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct EquipmentUpdate {
    pub equipment_name: Option<String>,
    pub config: Option<Vec<PackageConfig>>,
}

#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    /// Substring of the equipment name (case-insensitive)
    pub name_contains: Option<String>,
    /// Only configs that carry this package base code
    pub package8digit: Option<String>,
}

impl EquipmentFilter {
    fn matches(&self, doc: &EquipmentConfig) -> bool {
        if let Some(ref needle) = self.name_contains {
            if !doc
                .equipment_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(ref code) = self.package8digit {
            if doc.package(code).is_none() {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    #[value(name = "name")]
    EquipmentName,
    #[default]
    Created,
    Updated,
    #[value(name = "packages")]
    PackageCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: EquipmentFilter,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: EquipmentFilter::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

/// One page of results plus the total across all pages
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size.max(1))
    }
}

/// Trim surrounding whitespace from every `package8digit`
pub fn normalize_config(config: &mut [PackageConfig]) {
    for package in config.iter_mut() {
        let trimmed = package.package8digit.trim();
        if trimmed.len() != package.package8digit.len() {
            package.package8digit = trimmed.to_string();
        }
    }
}

/// Full-config validation shared by create and update
///
/// Repeated `package8digit` values are reported on their own, before any
/// other per-package check runs.
pub fn validate_config(equipment_name: &str, config: &[PackageConfig]) -> Result<(), ConfigError> {
    let duplicates = check_unique_packages(config);
    if !duplicates.is_empty() {
        return Err(ValidationReport::new(duplicates).into());
    }

    let mut violations = Vec::new();
    check_equipment_name(equipment_name, &mut violations);
    violations.extend(check_packages(config));
    ValidationReport::check(violations)?;
    Ok(())
}

pub struct EquipmentRepository<S> {
    store: S,
    options: RepositoryOptions,
}

impl<S: ConfigStore> EquipmentRepository<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, RepositoryOptions::default())
    }

    pub fn with_options(store: S, options: RepositoryOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> RepositoryOptions {
        self.options
    }

    fn same_name(&self, a: &str, b: &str) -> bool {
        self.options.same_name(a, b)
    }

    /// Validate and persist a new config
    ///
    /// Fails with `AlreadyExists` before any content check, then with
    /// duplicate package codes, then with every remaining violation at once.
    pub fn create(&self, mut input: NewEquipmentConfig) -> Result<EquipmentConfig, ConfigError> {
        normalize_config(&mut input.config);
        let created = self.store.write(move |docs| {
            if docs
                .iter()
                .any(|d| self.same_name(&d.equipment_name, &input.equipment_name))
            {
                return Err(ConfigError::AlreadyExists {
                    name: input.equipment_name,
                });
            }

            validate_config(&input.equipment_name, &input.config)?;

            let doc = EquipmentConfig::new(input.equipment_name, input.config);
            Ok((doc.clone(), Mutation::Insert(doc)))
        })?;

        info!(id = %created.id, name = %created.equipment_name, "created equipment config");
        Ok(created)
    }

    /// Replace the name and/or package list of an existing config
    pub fn update(&self, id: &ConfigId, update: EquipmentUpdate) -> Result<EquipmentConfig, ConfigError> {
        let updated = self.store.write(move |docs| {
            let current = docs
                .iter()
                .find(|d| d.id == *id)
                .ok_or_else(|| ConfigError::not_found(id))?;

            if let Some(ref name) = update.equipment_name {
                if docs
                    .iter()
                    .any(|d| d.id != *id && self.same_name(&d.equipment_name, name))
                {
                    return Err(ConfigError::AlreadyExists { name: name.clone() });
                }
            }

            let mut next = current.clone();
            if let Some(name) = update.equipment_name {
                next.equipment_name = name;
            }
            if let Some(mut config) = update.config {
                normalize_config(&mut config);
                next.config = config;
            }
            validate_config(&next.equipment_name, &next.config)?;

            next.updated = Utc::now();
            next.revision += 1;
            Ok((next.clone(), Mutation::Replace(next)))
        })?;

        info!(id = %updated.id, revision = updated.revision, "updated equipment config");
        Ok(updated)
    }

    /// Remove a config, returning what was removed
    pub fn delete(&self, id: &ConfigId) -> Result<EquipmentConfig, ConfigError> {
        let removed = self.store.write(|docs| {
            let doc = docs
                .iter()
                .find(|d| d.id == *id)
                .cloned()
                .ok_or_else(|| ConfigError::not_found(id))?;
            Ok((doc, Mutation::Remove(*id)))
        })?;

        info!(id = %removed.id, name = %removed.equipment_name, "deleted equipment config");
        Ok(removed)
    }

    pub fn get(&self, id: &ConfigId) -> Result<EquipmentConfig, ConfigError> {
        self.store
            .snapshot()?
            .into_iter()
            .find(|d| d.id == *id)
            .ok_or_else(|| ConfigError::not_found(id))
    }

    /// Look a config up by equipment name, honoring the case option
    pub fn find_by_name(&self, name: &str) -> Result<Option<EquipmentConfig>, ConfigError> {
        Ok(self
            .store
            .snapshot()?
            .into_iter()
            .find(|d| self.same_name(&d.equipment_name, name)))
    }

    /// Resolve an `EQP-` id or an equipment name to a stored config
    pub fn resolve(&self, reference: &str) -> Result<EquipmentConfig, ConfigError> {
        if ConfigId::looks_like_id(reference) {
            if let Ok(id) = reference.parse::<ConfigId>() {
                return self.get(&id);
            }
        }
        self.find_by_name(reference)?
            .ok_or_else(|| ConfigError::not_found(reference))
    }

    /// Filter, sort and page the stored configs
    ///
    /// Sorting is stable, so records that compare equal keep creation order
    /// in both directions.
    pub fn list(&self, query: &ListQuery) -> Result<Page<EquipmentConfig>, ConfigError> {
        let mut docs: Vec<EquipmentConfig> = self
            .store
            .snapshot()?
            .into_iter()
            .filter(|d| query.filter.matches(d))
            .collect();

        docs.sort_by(|a, b| {
            let ord = compare(query.sort, a, b);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let page = query.page.max(1);
        let page_size = query.page_size.max(1);
        let total = docs.len();
        let items: Vec<_> = docs
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        debug!(total, page, returned = items.len(), "listed equipment configs");
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

fn compare(field: SortField, a: &EquipmentConfig, b: &EquipmentConfig) -> Ordering {
    match field {
        SortField::EquipmentName => a.equipment_name.cmp(&b.equipment_name),
        SortField::Created => a.created.cmp(&b.created),
        SortField::Updated => a.updated.cmp(&b.updated),
        SortField::PackageCount => a.config.len().cmp(&b.config.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::selection::SelectionMask;
    use crate::core::store::MemoryStore;
    use crate::entities::package::tests::sample_package;
    use crate::entities::variant::tests::sample_variant;
    use std::sync::Arc;
    use std::thread;

    fn repo() -> EquipmentRepository<MemoryStore> {
        EquipmentRepository::new(MemoryStore::new())
    }

    fn input(name: &str, packages: &[&str]) -> NewEquipmentConfig {
        NewEquipmentConfig {
            equipment_name: name.to_string(),
            config: packages.iter().map(|p| sample_package(p)).collect(),
        }
    }

    #[test]
    fn test_create_then_get() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        assert_eq!(created.revision, 1);
        assert_eq!(repo.get(&created.id).unwrap(), created);
        assert_eq!(repo.find_by_name("TNF-61").unwrap(), Some(created));
    }

    #[test]
    fn test_create_trims_package_codes() {
        let repo = repo();
        let mut padded = sample_package("SOICW16U");
        padded.package8digit = " SOICW16U ".to_string();

        let created = repo
            .create(NewEquipmentConfig {
                equipment_name: "TNF-61".to_string(),
                config: vec![padded],
            })
            .unwrap();
        assert_eq!(created.config[0].package8digit, "SOICW16U");
        assert!(created.package("SOICW16U").is_some());
    }

    #[test]
    fn test_update_trimmed_codes_collide() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();
        let mut padded = sample_package("SOICW16U");
        padded.package8digit = "SOICW16U\t".to_string();

        let err = repo
            .update(
                &created.id,
                EquipmentUpdate {
                    config: Some(vec![sample_package("SOICW16U"), padded]),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatePackage8Digit);
        assert_eq!(repo.get(&created.id).unwrap().revision, 1);
    }

    #[test]
    fn test_create_duplicate_name() {
        let repo = repo();
        repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        let err = repo.create(input("TNF-61", &["QFPN0032"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(repo.store().snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_name_check_precedes_content_check() {
        let repo = repo();
        repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        let err = repo.create(input("TNF-61", &["SOIC"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_duplicate_package_reported_alone() {
        let repo = repo();
        let mut bad = input("TNF-61", &["SOICW16U", "SOICW16U"]);
        bad.config.push(PackageConfig::new("SHORT", SelectionMask::BASE_ONLY));

        let err = repo.create(bad).unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(err.kind(), ErrorKind::DuplicatePackage8Digit);
        assert_eq!(err.path().unwrap().to_string(), "config[1].package8digit");
    }

    #[test]
    fn test_all_violations_collected() {
        let repo = repo();
        let mut bad = input("", &["SOICW16U"]);
        bad.config.push(PackageConfig::new("SHORT", SelectionMask::BASE_ONLY));

        let err = repo.create(bad).unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has(ErrorKind::EmptyField));
        assert!(report.has(ErrorKind::InvalidLength));
        assert!(report.has(ErrorKind::EmptyConfig));
        assert!(repo.store().snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_empty_package_list_is_allowed() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &[])).unwrap();
        assert!(created.config.is_empty());
    }

    #[test]
    fn test_case_sensitivity_option() {
        let sensitive = repo();
        sensitive.create(input("TNF-61", &["SOICW16U"])).unwrap();
        assert!(sensitive.create(input("tnf-61", &["SOICW16U"])).is_ok());

        let insensitive = EquipmentRepository::with_options(
            MemoryStore::new(),
            RepositoryOptions {
                case_sensitive_names: false,
            },
        );
        insensitive.create(input("TNF-61", &["SOICW16U"])).unwrap();
        let err = insensitive.create(input("tnf-61", &["SOICW16U"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(insensitive.find_by_name("Tnf-61").unwrap().is_some());
    }

    #[test]
    fn test_update_replaces_config() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        let updated = repo
            .update(
                &created.id,
                EquipmentUpdate {
                    equipment_name: None,
                    config: Some(vec![sample_package("QFPN0032"), sample_package("SOICW16U")]),
                },
            )
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.equipment_name, "TNF-61");
        assert_eq!(updated.config.len(), 2);
        assert_eq!(updated.revision, 2);
        assert!(updated.updated >= created.updated);
        assert_eq!(updated.created, created.created);
    }

    #[test]
    fn test_update_may_keep_own_name() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        let updated = repo
            .update(
                &created.id,
                EquipmentUpdate {
                    equipment_name: Some("TNF-61".to_string()),
                    config: None,
                },
            )
            .unwrap();
        assert_eq!(updated.equipment_name, "TNF-61");
    }

    #[test]
    fn test_update_rejects_taken_name() {
        let repo = repo();
        repo.create(input("TNF-61", &["SOICW16U"])).unwrap();
        let other = repo.create(input("TNF-62", &["SOICW16U"])).unwrap();

        let err = repo
            .update(
                &other.id,
                EquipmentUpdate {
                    equipment_name: Some("TNF-61".to_string()),
                    config: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(repo.get(&other.id).unwrap().revision, 1);
    }

    #[test]
    fn test_update_invalid_config_leaves_record() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        let mut variant = sample_variant("SOICW16U");
        variant.operation_code = String::new();
        let err = repo
            .update(
                &created.id,
                EquipmentUpdate {
                    equipment_name: None,
                    config: Some(vec![
                        PackageConfig::new("SOICW16U", SelectionMask::BASE_ONLY).with_variant(variant)
                    ]),
                },
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyField);
        assert_eq!(repo.get(&created.id).unwrap(), created);
    }

    #[test]
    fn test_missing_id() {
        let repo = repo();
        let id = ConfigId::new();

        assert_eq!(repo.get(&id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(repo.delete(&id).unwrap_err().kind(), ErrorKind::NotFound);
        let err = repo.update(&id, EquipmentUpdate::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_then_get() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        let removed = repo.delete(&created.id).unwrap();
        assert_eq!(removed.id, created.id);
        assert_eq!(repo.get(&created.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(repo.create(input("TNF-61", &["SOICW16U"])).is_ok());
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let repo = repo();
        let created = repo.create(input("TNF-61", &["SOICW16U"])).unwrap();

        assert_eq!(repo.resolve(&created.id.to_string()).unwrap().id, created.id);
        assert_eq!(repo.resolve("TNF-61").unwrap().id, created.id);
        assert_eq!(repo.resolve("TNF-99").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_paging_and_filter() {
        let repo = repo();
        for i in 0..5 {
            let packages: &[&str] = if i % 2 == 0 { &["SOICW16U"] } else { &["QFPN0032"] };
            repo.create(input(&format!("TNF-{}", 60 + i), packages)).unwrap();
        }

        let page = repo
            .list(&ListQuery {
                page: 2,
                page_size: 2,
                ..ListQuery::default()
            })
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.page_count(), 3);
        let names: Vec<_> = page.items.iter().map(|d| d.equipment_name.as_str()).collect();
        assert_eq!(names, vec!["TNF-62", "TNF-63"]);

        let soic = repo
            .list(&ListQuery {
                filter: EquipmentFilter {
                    name_contains: Some("tnf".to_string()),
                    package8digit: Some("SOICW16U".to_string()),
                },
                ..ListQuery::default()
            })
            .unwrap();
        assert_eq!(soic.total, 3);

        let beyond = repo
            .list(&ListQuery {
                page: 9,
                ..ListQuery::default()
            })
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn test_list_sort_is_stable_both_ways() {
        let repo = repo();
        repo.create(input("B", &["SOICW16U"])).unwrap();
        repo.create(input("A", &["SOICW16U", "QFPN0032"])).unwrap();
        repo.create(input("C", &["SOICW16U"])).unwrap();

        let names = |sort, order| -> Vec<String> {
            repo.list(&ListQuery {
                sort,
                order,
                ..ListQuery::default()
            })
            .unwrap()
            .items
            .into_iter()
            .map(|d| d.equipment_name)
            .collect()
        };

        assert_eq!(names(SortField::EquipmentName, SortOrder::Asc), ["A", "B", "C"]);
        assert_eq!(names(SortField::EquipmentName, SortOrder::Desc), ["C", "B", "A"]);
        assert_eq!(names(SortField::PackageCount, SortOrder::Asc), ["B", "C", "A"]);
        assert_eq!(names(SortField::PackageCount, SortOrder::Desc), ["A", "B", "C"]);
    }

    #[test]
    fn test_concurrent_creates_admit_one() {
        let repo = Arc::new(repo());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.create(input("TNF-61", &["SOICW16U"])))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        }
        assert_eq!(repo.store().snapshot().unwrap().len(), 1);
    }
}
