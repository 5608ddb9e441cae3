use serde::{Deserialize, Serialize};

/// Field key assignment (`keys:` section).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidlConfigSchemaKeys {
    /// Keep explicit zero or negative field keys instead of replacing them with auto-assigned ones
    #[serde(default)]
    pub allow_negative_keys: bool,
    /// Treat a field without an explicit key as an error
    #[serde(default)]
    pub strict_implicit_keys: bool,
}

/// Optional compiler behaviors (`extensions:` section).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidlConfigSchemaExtensions {
    /// Synthesize a name (`str<key>`) for fields declared without one
    #[serde(default)]
    pub auto_generated_fields: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidlConfigSchema {
    #[serde(default)]
    pub keys: TidlConfigSchemaKeys,
    #[serde(default)]
    pub extensions: TidlConfigSchemaExtensions,
}
