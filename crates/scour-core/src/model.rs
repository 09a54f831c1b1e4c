use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One fetched document: field name -> value, as returned by the search
/// backend.
pub type Document = serde_json::Map<String, JsonValue>;

/// Index mapping type of a field, as reported by field capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Keyword,
    Long,
    Integer,
    Float,
    Double,
    Date,
    Boolean,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Long | FieldType::Integer | FieldType::Float | FieldType::Double
        )
    }

    /// Parse a capabilities type name. Unknown mapping types fall back to
    /// keyword so they take the default text-handling branch.
    pub fn from_caps_name(name: &str) -> Self {
        match name {
            "long" => FieldType::Long,
            "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "date" => FieldType::Date,
            "boolean" => FieldType::Boolean,
            _ => FieldType::Keyword,
        }
    }
}

/// Query-relevant schema for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub searchable: bool,
    pub aggregatable: bool,
    #[serde(default)]
    pub active: bool,
}

impl Default for FieldMetadata {
    /// The compiler's fallback for fields with no cache entry.
    fn default() -> Self {
        Self {
            field_type: FieldType::Keyword,
            searchable: true,
            aggregatable: true,
            active: false,
        }
    }
}

/// Per-type capability entry in a field-capabilities response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCapability {
    #[serde(rename = "type")]
    pub type_name: String,
    pub searchable: bool,
    pub aggregatable: bool,
}

/// Read-only view of the field metadata cache the compiler dispatches on.
pub trait FieldLookup {
    fn lookup(&self, field: &str) -> Option<FieldMetadata>;
}

/// Empty lookup for callers compiling without a populated cache.
pub struct NoFields;

impl FieldLookup for NoFields {
    fn lookup(&self, _field: &str) -> Option<FieldMetadata> {
        None
    }
}
