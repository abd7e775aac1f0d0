//! Configuration schema descriptors for plugins.
//!
//! A [`SchemaDescriptor`] is a declarative description of the configuration
//! object a plugin accepts. The same descriptor is used to validate incoming
//! configuration, to fill in defaults before a plugin is constructed, and to
//! drive form rendering in [`form`].

pub mod form;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

pub use form::{render_form, FormError, FormField, FormWidget};

/// Configuration object as received from a client.
pub type ConfigMap = serde_json::Map<String, Value>;

/// JSON type of a schema property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// A type name this crate does not understand.
    Unknown(String),
}

impl PropertyType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Unknown(name) => name,
        }
    }

    /// Whether `value` is an instance of this type.
    ///
    /// `integer` accepts only JSON integers; `number` accepts any JSON number.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Unknown(_) => true,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

impl From<String> for PropertyType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => Self::Unknown(name),
        }
    }
}

impl From<PropertyType> for String {
    fn from(kind: PropertyType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the JSON type of `value`, distinguishing integers from other numbers.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Description of a single configuration property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PropertySpec {
    /// Creates a property of the given type with no constraints.
    pub fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            default: None,
            choices: None,
            minimum: None,
            maximum: None,
            hidden: false,
        }
    }

    pub fn string() -> Self {
        Self::new(PropertyType::String)
    }

    pub fn integer() -> Self {
        Self::new(PropertyType::Integer)
    }

    pub fn number() -> Self {
        Self::new(PropertyType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(PropertyType::Boolean)
    }

    pub fn array() -> Self {
        Self::new(PropertyType::Array)
    }

    pub fn object() -> Self {
        Self::new(PropertyType::Object)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restricts a string property to the given choices.
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Checks a single non-null value against this property.
    pub fn check_value(&self, property: &str, value: &Value) -> Result<(), ValidationError> {
        if !self.kind.accepts(value) {
            return Err(ValidationError::TypeMismatch {
                property: property.to_string(),
                expected: self.kind.to_string(),
                actual: json_type_name(value).to_string(),
            });
        }

        if let (Some(choices), Some(s)) = (&self.choices, value.as_str()) {
            if !choices.iter().any(|c| c == s) {
                return Err(ValidationError::NotAllowed {
                    property: property.to_string(),
                    value: s.to_string(),
                    allowed: choices.clone(),
                });
            }
        }

        if self.kind.is_numeric() {
            if let Some(n) = value.as_f64() {
                let below = self.minimum.is_some_and(|min| n < min);
                let above = self.maximum.is_some_and(|max| n > max);
                if below || above {
                    return Err(ValidationError::OutOfRange {
                        property: property.to_string(),
                        value: n,
                        min: bound_label(self.minimum),
                        max: bound_label(self.maximum),
                    });
                }
            }
        }

        Ok(())
    }
}

fn bound_label(bound: Option<f64>) -> String {
    bound
        .map(|b| b.to_string())
        .unwrap_or_else(|| "unbounded".to_string())
}

/// Declarative description of a plugin's configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub title: String,
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    /// Properties in declaration order.
    #[serde(with = "ordered_properties")]
    pub properties: Vec<(String, PropertySpec)>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

impl SchemaDescriptor {
    /// Creates an empty object schema.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            schema_type: object_type(),
            properties: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Adds an optional property.
    pub fn property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.push((name.into(), spec));
        self
    }

    /// Adds a property and marks it required.
    pub fn required_property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.push((name, spec));
        self
    }

    /// Looks up a property by name.
    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Verifies the descriptor's own invariants.
    ///
    /// - every required name is a declared property
    /// - `enum` only appears on string properties and is non-empty
    /// - `minimum <= maximum`
    /// - every default is a valid value for its property
    /// - every type is one this crate understands
    pub fn check(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidSchema {
            schema: self.title.clone(),
            reason,
        };

        for name in &self.required {
            if self.get(name).is_none() {
                return Err(invalid(format!(
                    "required property '{}' is not declared",
                    name
                )));
            }
        }

        for (index, (name, spec)) in self.properties.iter().enumerate() {
            if self.properties[..index].iter().any(|(n, _)| n == name) {
                return Err(invalid(format!("property '{}' is declared twice", name)));
            }
            if let PropertyType::Unknown(type_name) = &spec.kind {
                return Err(invalid(format!(
                    "property '{}' has unknown type '{}'",
                    name, type_name
                )));
            }
            if let Some(choices) = &spec.choices {
                if spec.kind != PropertyType::String {
                    return Err(invalid(format!(
                        "property '{}' has enum but type {}",
                        name, spec.kind
                    )));
                }
                if choices.is_empty() {
                    return Err(invalid(format!("property '{}' has an empty enum", name)));
                }
            }
            if let (Some(min), Some(max)) = (spec.minimum, spec.maximum) {
                if min > max {
                    return Err(invalid(format!(
                        "property '{}' has minimum {} above maximum {}",
                        name, min, max
                    )));
                }
            }
            if let Some(default) = &spec.default {
                spec.check_value(name, default)
                    .map_err(|e| invalid(format!("default does not validate: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Validates a configuration object against this schema.
    ///
    /// Required properties are checked in declared order and the first
    /// missing one is reported. A `null` value counts as absent. Properties
    /// not declared by the schema are accepted untouched.
    pub fn validate(&self, config: &ConfigMap) -> Result<(), ValidationError> {
        for name in &self.required {
            if config.get(name).is_none_or(Value::is_null) {
                return Err(ValidationError::MissingRequired {
                    property: name.clone(),
                });
            }
        }

        for (name, spec) in &self.properties {
            match config.get(name) {
                Some(value) if !value.is_null() => spec.check_value(name, value)?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Validates `config` and returns a copy with defaults filled in for
    /// absent properties.
    pub fn resolve(&self, config: &ConfigMap) -> Result<ConfigMap, ValidationError> {
        self.validate(config)?;

        let mut resolved = config.clone();
        for (name, spec) in &self.properties {
            let absent = resolved.get(name).is_none_or(Value::is_null);
            if absent {
                if let Some(default) = &spec.default {
                    resolved.insert(name.clone(), default.clone());
                }
            }
        }
        Ok(resolved)
    }
}

/// Non-empty string value of `key`.
pub fn config_str<'a>(config: &'a ConfigMap, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn config_u64(config: &ConfigMap, key: &str) -> Option<u64> {
    config.get(key).and_then(Value::as_u64)
}

pub fn config_f64(config: &ConfigMap, key: &str) -> Option<f64> {
    config.get(key).and_then(Value::as_f64)
}

pub fn config_bool(config: &ConfigMap, key: &str) -> Option<bool> {
    config.get(key).and_then(Value::as_bool)
}

/// Serializes the property list as a JSON object while keeping declaration order.
mod ordered_properties {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::PropertySpec;

    pub fn serialize<S>(properties: &[(String, PropertySpec)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(properties.len()))?;
        for (name, spec) in properties {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, PropertySpec)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Vec<(String, PropertySpec)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of property names to property specs")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut properties = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, PropertySpec>()? {
                    properties.push((name, spec));
                }
                Ok(properties)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test config must be an object"),
        }
    }

    fn sample_schema() -> SchemaDescriptor {
        SchemaDescriptor::new("Sample")
            .required_property("model_id", PropertySpec::string())
            .required_property("api_key", PropertySpec::string())
            .property(
                "model",
                PropertySpec::string()
                    .choices(["small", "large"])
                    .default_value("small"),
            )
            .property(
                "temperature",
                PropertySpec::number()
                    .minimum(0.0)
                    .maximum(2.0)
                    .default_value(0.7),
            )
            .property("max_tokens", PropertySpec::integer().minimum(1.0))
            .property("stream", PropertySpec::boolean().hidden())
    }

    #[test]
    fn test_sample_schema_is_consistent() {
        assert!(sample_schema().check().is_ok());
    }

    #[test]
    fn test_missing_required_reports_first_in_order() {
        let err = sample_schema()
            .validate(&config(json!({ "model": "small" })))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequired {
                property: "model_id".to_string()
            }
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = sample_schema()
            .validate(&config(json!({ "model_id": null, "api_key": "k" })))
            .unwrap_err();
        assert_eq!(err.property(), Some("model_id"));
    }

    #[test]
    fn test_type_mismatch_names_property() {
        let err = sample_schema()
            .validate(&config(json!({
                "model_id": "m",
                "api_key": "k",
                "max_tokens": "many"
            })))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch { ref property, ref expected, ref actual }
                if property == "max_tokens" && expected == "integer" && actual == "string"
        ));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let err = sample_schema()
            .validate(&config(json!({ "model_id": "m", "api_key": "k", "max_tokens": 1.5 })))
            .unwrap_err();
        assert_eq!(err.property(), Some("max_tokens"));
    }

    #[test]
    fn test_number_accepts_integer() {
        assert!(sample_schema()
            .validate(&config(json!({ "model_id": "m", "api_key": "k", "temperature": 1 })))
            .is_ok());
    }

    #[test]
    fn test_enum_and_bounds() {
        let schema = sample_schema();
        let err = schema
            .validate(&config(json!({ "model_id": "m", "api_key": "k", "model": "huge" })))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { .. }));

        let err = schema
            .validate(&config(json!({ "model_id": "m", "api_key": "k", "temperature": 3.0 })))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref property, .. } if property == "temperature"));
    }

    #[test]
    fn test_unknown_properties_pass_through() {
        let input = config(json!({ "model_id": "m", "api_key": "k", "future_flag": [1, 2] }));
        let resolved = sample_schema().resolve(&input).unwrap();
        assert_eq!(resolved.get("future_flag"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_resolve_fills_defaults_without_touching_given_values() {
        let input = config(json!({ "model_id": "m", "api_key": "k", "temperature": 1.2 }));
        let resolved = sample_schema().resolve(&input).unwrap();
        assert_eq!(resolved.get("model"), Some(&json!("small")));
        assert_eq!(resolved.get("temperature"), Some(&json!(1.2)));
        assert!(resolved.get("max_tokens").is_none());
    }

    #[test]
    fn test_check_rejects_broken_descriptors() {
        let undeclared = SchemaDescriptor {
            required: vec!["ghost".to_string()],
            ..SchemaDescriptor::new("Broken")
        };
        assert!(matches!(
            undeclared.check(),
            Err(ValidationError::InvalidSchema { .. })
        ));

        let enum_on_integer = SchemaDescriptor::new("Broken")
            .property("n", PropertySpec::integer().choices(["1", "2"]));
        assert!(enum_on_integer.check().is_err());

        let bad_default =
            SchemaDescriptor::new("Broken").property("n", PropertySpec::integer().default_value("x"));
        assert!(bad_default.check().is_err());

        let inverted = SchemaDescriptor::new("Broken")
            .property("n", PropertySpec::number().minimum(5.0).maximum(1.0));
        assert!(inverted.check().is_err());
    }

    #[test]
    fn test_serialization_preserves_property_order() {
        let schema = sample_schema();
        let json = serde_json::to_value(&schema).unwrap();
        let names: Vec<&String> = json["properties"].as_object().unwrap().keys().collect();
        assert_eq!(
            names,
            ["model_id", "api_key", "model", "temperature", "max_tokens", "stream"]
        );
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["model"]["enum"], json!(["small", "large"]));
        assert_eq!(json["properties"]["stream"]["hidden"], true);
        assert!(json["properties"]["model_id"].get("hidden").is_none());

        let back: SchemaDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_unknown_type_deserializes() {
        let spec: PropertySpec = serde_json::from_value(json!({ "type": "date" })).unwrap();
        assert_eq!(spec.kind, PropertyType::Unknown("date".to_string()));
    }
}
