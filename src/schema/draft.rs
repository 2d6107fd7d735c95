//! Boundary validation: loosely-typed documents to the typed model
//!
//! Operator input arrives as a `serde_json::Value` (YAML is converted first).
//! Nothing past this module sees an open-ended map. Every violation is
//! collected before giving up so a document can be fixed in one pass.

use serde_json::{Map, Value};

use crate::core::error::{ErrorKind, FieldPath, ValidationReport, Violation};
use crate::core::identity::ConfigId;
use crate::core::repository::NewEquipmentConfig;
use crate::core::selection::SelectionMask;
use crate::entities::equipment::check_unique_package_codes;
use crate::entities::package::{check_package8digit, check_unique_selection_codes, empty_config};
use crate::entities::variant::{
    check_source_code, check_text, AllowToolIds, MatchOptions, ToolPosition, ValidateType,
};
use crate::entities::{PackageConfig, ValidationVariant};

const VARIANT_KEYS: [&str; 8] = [
    "package_selection_code",
    "operation_code",
    "on_operation",
    "validate_type",
    "recipe_name",
    "product_name",
    "options",
    "allow_tool_id",
];

const PACKAGE_KEYS: [&str; 3] = ["package8digit", "selection_code", "data_with_selection_code"];

/// Top-level keys; the last four are store metadata and are accepted on import
const EQUIPMENT_KEYS: [&str; 6] = [
    "equipment_name",
    "config",
    "id",
    "created",
    "updated",
    "revision",
];

/// A fully validated equipment document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentDocument {
    /// Present when the document was exported from a store
    pub id: Option<ConfigId>,
    pub equipment_name: String,
    pub config: Vec<PackageConfig>,
}

impl EquipmentDocument {
    pub fn into_new(self) -> NewEquipmentConfig {
        NewEquipmentConfig {
            equipment_name: self.equipment_name,
            config: self.config,
        }
    }
}

/// Validate one variant object
pub fn validate_variant(value: &Value, path: &FieldPath) -> Result<ValidationVariant, ValidationReport> {
    let mut out = Vec::new();
    let variant = collect_variant(value, path, &mut out);
    finish(variant, out)
}

/// Validate a variant and check its identifier against the source code it was derived from
pub fn validate_variant_for_source(
    value: &Value,
    mask: SelectionMask,
    code15: &str,
    path: &FieldPath,
) -> Result<ValidationVariant, ValidationReport> {
    let mut out = Vec::new();
    let variant = collect_variant(value, path, &mut out);
    if let Some(ref variant) = variant {
        out.extend(check_source_code(variant, mask, code15, path));
    }
    finish(variant, out)
}

/// Validate one package object
pub fn validate_package(value: &Value, path: &FieldPath) -> Result<PackageConfig, ValidationReport> {
    let mut out = Vec::new();
    let package = collect_package(value, path, &mut out);
    finish(package, out)
}

/// Validate a whole equipment document
///
/// Repeated `package8digit` values are reported on their own, like
/// [`validate_config`](crate::core::repository::validate_config) does.
pub fn validate_equipment(value: &Value) -> Result<EquipmentDocument, ValidationReport> {
    let mut out = Vec::new();
    let document = collect_equipment(value, &mut out);
    if out.iter().any(|v| v.kind == ErrorKind::DuplicatePackage8Digit) {
        out.retain(|v| v.kind == ErrorKind::DuplicatePackage8Digit);
    }
    finish(document, out)
}

fn finish<T>(value: Option<T>, violations: Vec<Violation>) -> Result<T, ValidationReport> {
    match value {
        Some(value) if violations.is_empty() => Ok(value),
        _ => Err(ValidationReport::new(violations)),
    }
}

/// Typed access to the fields of one JSON object
struct Draft<'a> {
    object: &'a Map<String, Value>,
    path: FieldPath,
}

impl<'a> Draft<'a> {
    fn open(value: &'a Value, path: &FieldPath, out: &mut Vec<Violation>) -> Option<Self> {
        match value.as_object() {
            Some(object) => Some(Self {
                object,
                path: path.clone(),
            }),
            None => {
                out.push(type_mismatch(path.clone(), "an object", value));
                None
            }
        }
    }

    /// Absent and null both count as missing
    fn required(&self, key: &str, out: &mut Vec<Violation>) -> Option<&'a Value> {
        match self.object.get(key) {
            None | Some(Value::Null) => {
                out.push(Violation::missing(self.path.field(key)));
                None
            }
            Some(value) => Some(value),
        }
    }

    fn string(&self, key: &str, out: &mut Vec<Violation>) -> Option<&'a str> {
        let value = self.required(key, out)?;
        match value.as_str() {
            Some(s) => Some(s),
            None => {
                out.push(type_mismatch(self.path.field(key), "a string", value));
                None
            }
        }
    }

    /// A required, non-blank string
    fn text(&self, key: &str, out: &mut Vec<Violation>) -> Option<String> {
        let value = self.string(key, out)?;
        let before = out.len();
        check_text(self.path.field(key), value, out);
        (out.len() == before).then(|| value.to_string())
    }

    fn boolean(&self, key: &str, out: &mut Vec<Violation>) -> Option<bool> {
        let value = self.required(key, out)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                out.push(type_mismatch(self.path.field(key), "true or false", value));
                None
            }
        }
    }

    fn array(&self, key: &str, out: &mut Vec<Violation>) -> Option<&'a Vec<Value>> {
        let value = self.required(key, out)?;
        match value.as_array() {
            Some(items) => Some(items),
            None => {
                out.push(type_mismatch(self.path.field(key), "a list", value));
                None
            }
        }
    }

    fn object(&self, key: &str, out: &mut Vec<Violation>) -> Option<Draft<'a>> {
        let value = self.required(key, out)?;
        Draft::open(value, &self.path.field(key), out)
    }

    fn reject_unknown(&self, allowed: &[&str], out: &mut Vec<Violation>) {
        for key in self.object.keys() {
            if !allowed.contains(&key.as_str()) {
                out.push(Violation::new(
                    ErrorKind::UnexpectedField,
                    self.path.field(key),
                    format!("unknown field '{}'", key),
                ));
            }
        }
    }
}

fn type_mismatch(path: FieldPath, expected: &str, found: &Value) -> Violation {
    Violation::new(
        ErrorKind::InvalidFieldType,
        path,
        format!("expected {}, found {}", expected, json_type(found)),
    )
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

pub(crate) fn collect_variant(
    value: &Value,
    path: &FieldPath,
    out: &mut Vec<Violation>,
) -> Option<ValidationVariant> {
    let draft = Draft::open(value, path, out)?;
    draft.reject_unknown(&VARIANT_KEYS, out);

    let package_selection_code = draft.text("package_selection_code", out);
    let operation_code = draft.text("operation_code", out);
    let on_operation = draft.text("on_operation", out);
    let validate_type = collect_validate_type(&draft, out);
    let recipe_name = draft.text("recipe_name", out);
    let product_name = draft.text("product_name", out);
    let options = collect_options(&draft, out);
    let allow_tool_id = collect_allow_tool_id(&draft, out);

    Some(ValidationVariant {
        package_selection_code: package_selection_code?,
        operation_code: operation_code?,
        on_operation: on_operation?,
        validate_type: validate_type?,
        recipe_name: recipe_name?,
        product_name: product_name?,
        options: options?,
        allow_tool_id: allow_tool_id?,
    })
}

fn collect_validate_type(draft: &Draft<'_>, out: &mut Vec<Violation>) -> Option<ValidateType> {
    let raw = draft.string("validate_type", out)?;
    match raw.parse() {
        Ok(validate_type) => Some(validate_type),
        Err(_) => {
            out.push(Violation::new(
                ErrorKind::InvalidValidateType,
                draft.path.field("validate_type"),
                format!("'{}' is not one of: recipe, tool_id", raw),
            ));
            None
        }
    }
}

fn collect_options(draft: &Draft<'_>, out: &mut Vec<Violation>) -> Option<MatchOptions> {
    let options = draft.object("options", out)?;
    options.reject_unknown(&MatchOptions::KEYS, out);

    let use_operation_code = options.boolean("use_operation_code", out);
    let use_on_operation = options.boolean("use_on_operation", out);
    let use_lot_hold = options.boolean("use_lot_hold", out);

    Some(MatchOptions {
        use_operation_code: use_operation_code?,
        use_on_operation: use_on_operation?,
        use_lot_hold: use_lot_hold?,
    })
}

fn collect_allow_tool_id(draft: &Draft<'_>, out: &mut Vec<Violation>) -> Option<AllowToolIds> {
    let positions = draft.object("allow_tool_id", out)?;
    let mut allow = AllowToolIds::new();
    let mut ok = true;

    for (key, value) in positions.object {
        let path = positions.path.field(key);
        let position = match key.parse::<ToolPosition>() {
            Ok(position) => position,
            Err(_) => {
                out.push(Violation::new(
                    ErrorKind::UnknownToolPosition,
                    path,
                    format!("'{}' is not one of: position_1, position_2, position_3, position_4", key),
                ));
                ok = false;
                continue;
            }
        };
        match collect_tool_ids(value, &path, out) {
            Some(ids) => allow.set(position, ids),
            None => ok = false,
        }
    }

    ok.then_some(allow)
}

fn collect_tool_ids(value: &Value, path: &FieldPath, out: &mut Vec<Violation>) -> Option<Vec<String>> {
    let Some(items) = value.as_array() else {
        out.push(type_mismatch(path.clone(), "a list of tool ids", value));
        return None;
    };

    let mut ids = Vec::with_capacity(items.len());
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(id) => ids.push(id.to_string()),
            None => {
                out.push(type_mismatch(path.index(i), "a string", item));
                ok = false;
            }
        }
    }
    ok.then_some(ids)
}

pub(crate) fn collect_package(
    value: &Value,
    path: &FieldPath,
    out: &mut Vec<Violation>,
) -> Option<PackageConfig> {
    let draft = Draft::open(value, path, out)?;
    draft.reject_unknown(&PACKAGE_KEYS, out);

    let package8digit = draft.string("package8digit", out).and_then(|raw| {
        let code = raw.trim();
        let before = out.len();
        check_package8digit(path.field("package8digit"), code, out);
        (out.len() == before).then(|| code.to_string())
    });

    let selection_code =
        draft
            .string("selection_code", out)
            .and_then(|raw| match SelectionMask::parse(raw) {
                Ok(mask) => Some(mask),
                Err(err) => {
                    out.push(Violation::selection(path.field("selection_code"), &err));
                    None
                }
            });

    let variants = collect_variants(&draft, out);

    Some(PackageConfig {
        package8digit: package8digit?,
        selection_code: selection_code?,
        data_with_selection_code: variants?,
    })
}

fn collect_variants(draft: &Draft<'_>, out: &mut Vec<Violation>) -> Option<Vec<ValidationVariant>> {
    let items = draft.array("data_with_selection_code", out)?;
    let list_path = draft.path.field("data_with_selection_code");
    if items.is_empty() {
        out.push(empty_config(list_path));
        return None;
    }

    let mut variants = Vec::with_capacity(items.len());
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        match collect_variant(item, &list_path.index(i), out) {
            Some(variant) => variants.push(variant),
            None => ok = false,
        }
    }

    // Scan the raw identifiers so reported indexes match the document.
    let codes = items.iter().map(|item| {
        item.get("package_selection_code")
            .and_then(Value::as_str)
            .unwrap_or("")
    });
    if let Some(duplicate) = check_unique_selection_codes(codes, &list_path) {
        out.push(duplicate);
        ok = false;
    }

    ok.then_some(variants)
}

fn collect_equipment(value: &Value, out: &mut Vec<Violation>) -> Option<EquipmentDocument> {
    let draft = Draft::open(value, &FieldPath::root(), out)?;
    draft.reject_unknown(&EQUIPMENT_KEYS, out);

    let id = match draft.object.get("id") {
        None | Some(Value::Null) => Some(None),
        Some(value) => match value.as_str().map(str::parse::<ConfigId>) {
            Some(Ok(id)) => Some(Some(id)),
            _ => {
                out.push(Violation::new(
                    ErrorKind::InvalidFieldType,
                    draft.path.field("id"),
                    format!("expected an EQP- identifier, found {}", value),
                ));
                None
            }
        },
    };

    let equipment_name = draft.text("equipment_name", out);
    let config = draft.array("config", out).and_then(|items| collect_packages(items, out));

    Some(EquipmentDocument {
        id: id?,
        equipment_name: equipment_name?,
        config: config?,
    })
}

fn collect_packages(items: &[Value], out: &mut Vec<Violation>) -> Option<Vec<PackageConfig>> {
    let duplicates = check_unique_package_codes(items.iter().enumerate().filter_map(|(i, item)| {
        item.get("package8digit")
            .and_then(Value::as_str)
            .map(|code| (i, code.trim()))
    }));
    if !duplicates.is_empty() {
        out.extend(duplicates);
        return None;
    }

    let mut ok = true;
    let list_path = FieldPath::root().field("config");
    let mut packages = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match collect_package(item, &list_path.index(i), out) {
            Some(package) => packages.push(package),
            None => ok = false,
        }
    }

    ok.then_some(packages)
}
