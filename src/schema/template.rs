//! Scaffold generation for new equipment documents

use rust_embed::Embed;
use tera::Tera;
use thiserror::Error;

use crate::core::selection::{derive_with_mask, PackageCodeParts, SelectionError, SelectionMask};
use crate::entities::ValidateType;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const EQUIPMENT_TEMPLATE: &str = "equipment.yaml.tera";

/// Context for template generation
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub equipment_name: String,
    pub package8digit: String,
    pub selection_code: SelectionMask,
    pub package_selection_code: String,
    pub validate_type: ValidateType,
}

impl TemplateContext {
    pub fn new(equipment_name: impl Into<String>) -> Self {
        Self {
            equipment_name: equipment_name.into(),
            package8digit: String::new(),
            selection_code: SelectionMask::BASE_ONLY,
            package_selection_code: String::new(),
            validate_type: ValidateType::Recipe,
        }
    }

    /// Base-only package; the identifier is the base itself
    pub fn with_package(mut self, package8digit: impl Into<String>) -> Self {
        self.package8digit = package8digit.into();
        self.selection_code = SelectionMask::BASE_ONLY;
        self.package_selection_code = self.package8digit.clone();
        self
    }

    /// Derive the package and first identifier from a sample 15-character code
    pub fn with_source_code(mut self, code15: &str, mask: SelectionMask) -> Result<Self, SelectionError> {
        let parts = PackageCodeParts::parse(code15)?;
        self.package_selection_code = derive_with_mask(code15, mask)?;
        self.package8digit = parts.base;
        self.selection_code = mask;
        Ok(self)
    }

    pub fn with_validate_type(mut self, validate_type: ValidateType) -> Self {
        self.validate_type = validate_type;
        self
    }
}

/// Template generator using Tera
pub struct TemplateGenerator {
    tera: Tera,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    RenderError(String),
}

impl TemplateGenerator {
    /// Create a new template generator with embedded templates
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                if let Ok(template_str) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(filename, template_str)
                        .map_err(|e| TemplateError::RenderError(e.to_string()))?;
                }
            }
        }

        Ok(Self { tera })
    }

    /// Generate an equipment document scaffold
    pub fn generate_equipment(&self, ctx: &TemplateContext) -> Result<String, TemplateError> {
        if !self.tera.get_template_names().any(|n| n == EQUIPMENT_TEMPLATE) {
            return Err(TemplateError::NotFound(EQUIPMENT_TEMPLATE.to_string()));
        }

        let mut context = tera::Context::new();
        context.insert("equipment_name", &ctx.equipment_name);
        context.insert("package8digit", &ctx.package8digit);
        context.insert("selection_code", &ctx.selection_code.to_string());
        context.insert("package_selection_code", &ctx.package_selection_code);
        context.insert("validate_type", ctx.validate_type.as_str());

        self.tera
            .render(EQUIPMENT_TEMPLATE, &context)
            .map_err(|e| TemplateError::RenderError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::schema::validator::{DocumentError, Validator};

    #[test]
    fn test_template_generates_valid_yaml() {
        let generator = TemplateGenerator::new().unwrap();
        let ctx = TemplateContext::new("TNF \"61\"").with_package("SOICW16U");

        let yaml = generator.generate_equipment(&ctx).unwrap();

        let parsed: serde_yml::Value = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed["equipment_name"].as_str(), Some("TNF \"61\""));
        assert_eq!(parsed["config"][0]["selection_code"].as_str(), Some("1000"));
    }

    #[test]
    fn test_template_from_source_code() {
        let ctx = TemplateContext::new("TNF-61")
            .with_source_code("SOICW16U0001AB1", SelectionMask::parse("1011").unwrap())
            .unwrap()
            .with_validate_type(ValidateType::ToolId);
        assert_eq!(ctx.package8digit, "SOICW16U");
        assert_eq!(ctx.package_selection_code, "SOICW16UB11");

        assert!(TemplateContext::new("x")
            .with_source_code("SHORT", SelectionMask::ALL)
            .is_err());
    }

    #[test]
    fn test_scaffold_only_lacks_operator_fields() {
        let generator = TemplateGenerator::new().unwrap();
        let ctx = TemplateContext::new("TNF-61").with_package("SOICW16U");
        let yaml = generator.generate_equipment(&ctx).unwrap();

        let err = match Validator::default().validate(&yaml, "scaffold.yaml") {
            Err(DocumentError::Invalid(err)) => err,
            other => panic!("expected blanks to be reported, got {:?}", other),
        };
        let fields: Vec<String> = err
            .violations()
            .iter()
            .inspect(|v| assert_eq!(v.kind(), ErrorKind::EmptyField))
            .map(|v| v.path().to_string())
            .collect();
        insta::assert_debug_snapshot!(fields, @r###"
        [
            "config[0].data_with_selection_code[0].operation_code",
            "config[0].data_with_selection_code[0].on_operation",
            "config[0].data_with_selection_code[0].recipe_name",
            "config[0].data_with_selection_code[0].product_name",
        ]
        "###);
    }
}
