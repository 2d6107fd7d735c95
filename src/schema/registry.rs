//! Embedded JSON Schemas

use rust_embed::Embed;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// File name of the equipment document schema
pub const EQUIPMENT_SCHEMA: &str = "equipment.schema.json";

/// Registry of the schemas compiled into the binary
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Raw schema text by file name
    pub fn get(&self, name: &str) -> Option<String> {
        EmbeddedSchemas::get(name)
            .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
    }

    pub fn equipment(&self) -> Option<String> {
        self.get(EQUIPMENT_SCHEMA)
    }

    /// Names of every embedded schema
    pub fn names(&self) -> Vec<String> {
        EmbeddedSchemas::iter().map(|name| name.to_string()).collect()
    }
}
