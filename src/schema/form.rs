//! Interpretation of schema descriptors as input forms.
//!
//! Every [`PropertyType`] has exactly one widget. A type this crate does not
//! understand is reported as [`FormError::UnsupportedType`] instead of being
//! skipped.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::{PropertySpec, PropertyType, SchemaDescriptor};

/// Errors raised while turning a schema into a form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("Property '{property}' has unsupported type '{type_name}'")]
    UnsupportedType { property: String, type_name: String },
}

/// Input widget chosen for a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FormWidget {
    Select {
        options: Vec<String>,
    },
    Secret,
    Text,
    Number {
        integer: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        step: f64,
    },
    Checkbox,
    /// One value per line.
    List,
    /// Free-form JSON editor.
    Json,
}

/// A single rendered form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(flatten)]
    pub widget: FormWidget,
}

fn is_secret_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "api_key" || lower.contains("password") || lower.contains("secret")
}

/// Chooses the widget for one property.
pub fn widget_for(name: &str, spec: &PropertySpec) -> Result<FormWidget, FormError> {
    let widget = match &spec.kind {
        PropertyType::String => match &spec.choices {
            Some(options) => FormWidget::Select {
                options: options.clone(),
            },
            None if is_secret_name(name) => FormWidget::Secret,
            None => FormWidget::Text,
        },
        PropertyType::Integer => FormWidget::Number {
            integer: true,
            min: spec.minimum,
            max: spec.maximum,
            step: 1.0,
        },
        PropertyType::Number => FormWidget::Number {
            integer: false,
            min: spec.minimum,
            max: spec.maximum,
            step: 0.1,
        },
        PropertyType::Boolean => FormWidget::Checkbox,
        PropertyType::Array => FormWidget::List,
        PropertyType::Object => FormWidget::Json,
        PropertyType::Unknown(type_name) => {
            return Err(FormError::UnsupportedType {
                property: name.to_string(),
                type_name: type_name.clone(),
            })
        }
    };
    Ok(widget)
}

/// Renders the visible properties of `schema` in declaration order.
pub fn render_form(schema: &SchemaDescriptor) -> Result<Vec<FormField>, FormError> {
    schema
        .properties
        .iter()
        .filter(|(_, spec)| !spec.hidden)
        .map(|(name, spec)| {
            Ok(FormField {
                name: name.clone(),
                label: spec.title.clone().unwrap_or_else(|| name.clone()),
                description: spec.description.clone(),
                required: schema.is_required(name),
                default: spec.default.clone(),
                widget: widget_for(name, spec)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpretation_table() {
        let schema = SchemaDescriptor::new("Form")
            .required_property("api_key", PropertySpec::string())
            .property("model", PropertySpec::string().choices(["a", "b"]))
            .property("name", PropertySpec::string().title("Display name"))
            .property("count", PropertySpec::integer().minimum(1.0).maximum(50.0))
            .property("temperature", PropertySpec::number())
            .property("verbose", PropertySpec::boolean())
            .property("stop", PropertySpec::array())
            .property("extra", PropertySpec::object())
            .property("internal", PropertySpec::string().hidden());

        let fields = render_form(&schema).unwrap();
        let widgets: Vec<&FormWidget> = fields.iter().map(|f| &f.widget).collect();

        assert_eq!(fields.len(), 8);
        assert_eq!(widgets[0], &FormWidget::Secret);
        assert!(fields[0].required);
        assert_eq!(
            widgets[1],
            &FormWidget::Select {
                options: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert_eq!(widgets[2], &FormWidget::Text);
        assert_eq!(fields[2].label, "Display name");
        assert_eq!(
            widgets[3],
            &FormWidget::Number {
                integer: true,
                min: Some(1.0),
                max: Some(50.0),
                step: 1.0
            }
        );
        assert!(matches!(widgets[4], FormWidget::Number { integer: false, .. }));
        assert_eq!(widgets[5], &FormWidget::Checkbox);
        assert_eq!(widgets[6], &FormWidget::List);
        assert_eq!(widgets[7], &FormWidget::Json);
        assert!(fields.iter().all(|f| f.name != "internal"));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let schema = SchemaDescriptor::new("Form")
            .property("when", PropertySpec::new(PropertyType::Unknown("date".to_string())));
        let err = render_form(&schema).unwrap_err();
        assert_eq!(
            err,
            FormError::UnsupportedType {
                property: "when".to_string(),
                type_name: "date".to_string()
            }
        );
    }

    #[test]
    fn test_field_serializes_flat() {
        let schema = SchemaDescriptor::new("Form").property("flag", PropertySpec::boolean());
        let fields = render_form(&schema).unwrap();
        let json = serde_json::to_value(&fields[0]).unwrap();
        assert_eq!(json["widget"], "checkbox");
        assert_eq!(json["name"], "flag");
        assert_eq!(json["required"], false);
    }
}
