use serde::Deserialize;

/// Options for a parse. `Deserialize` lets hosts load it from their own config files.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Canonical names whose payload is not stored when the stream holds binary data.
    pub withheld_binary_fields: Vec<String>,
    /// Reject sector-size markers other than 512 and 4096 instead of assuming 512.
    pub strict_sector_size: bool,
    /// Decode `__properties_version1.0` inside attachment and recipient storages.
    pub decode_sub_object_properties: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            withheld_binary_fields: vec!["BodyHtml".to_string()],
            strict_sector_size: false,
            decode_sub_object_properties: true,
        }
    }
}

impl ParserConfig {
    pub fn with_withheld_binary_fields(mut self, fields: Vec<String>) -> Self {
        self.withheld_binary_fields = fields;
        self
    }

    pub fn with_strict_sector_size(mut self, strict: bool) -> Self {
        self.strict_sector_size = strict;
        self
    }

    pub fn with_sub_object_properties(mut self, decode: bool) -> Self {
        self.decode_sub_object_properties = decode;
        self
    }

    pub(crate) fn withholds(&self, name: &str) -> bool {
        self.withheld_binary_fields
            .iter()
            .any(|field| field == name)
    }
}
