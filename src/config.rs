//! Spec-wide options.

use serde::{Deserialize, Serialize};

/// Options shared by every transform built from a [`Spec`](crate::Spec).
///
/// Deserializes from a JSON object where every key is optional:
///
/// ```json
/// { "use_models": false, "include_missing_properties": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecConfig {
    /// Unmarshal bound object schemas into [`Model`](crate::Model) values
    /// instead of plain maps.
    pub use_models: bool,
    /// Fill declared-but-absent properties with their default (or null).
    pub include_missing_properties: bool,
    /// Validate response payloads before unmarshaling them.
    pub validate_responses: bool,
    /// Validate request payloads after marshaling them.
    pub validate_requests: bool,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            use_models: true,
            include_missing_properties: true,
            validate_responses: true,
            validate_requests: true,
        }
    }
}

impl SpecConfig {
    pub fn use_models(mut self, use_models: bool) -> Self {
        self.use_models = use_models;
        self
    }

    pub fn include_missing_properties(mut self, include: bool) -> Self {
        self.include_missing_properties = include;
        self
    }

    pub fn validate_responses(mut self, validate: bool) -> Self {
        self.validate_responses = validate;
        self
    }

    pub fn validate_requests(mut self, validate: bool) -> Self {
        self.validate_requests = validate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_enable_everything() {
        let config = SpecConfig::default();
        assert!(config.use_models);
        assert!(config.include_missing_properties);
        assert!(config.validate_responses);
        assert!(config.validate_requests);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SpecConfig =
            serde_json::from_value(json!({ "include_missing_properties": false })).unwrap();
        assert!(!config.include_missing_properties);
        assert!(config.use_models);
    }

    #[test]
    fn builder_setters() {
        let config = SpecConfig::default()
            .use_models(false)
            .validate_responses(false);
        assert!(!config.use_models);
        assert!(!config.validate_responses);
        assert!(config.validate_requests);
    }
}
