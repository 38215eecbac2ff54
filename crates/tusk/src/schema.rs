//! Schema handles and the validator adapter around [`jsonschema`].
//!
//! A [`Schema`] is a JSON Schema document. [`Validator::compile`] compiles it once at
//! registration, [`Validator::validate`] checks a value and reports every violation as a
//! [`ValidationError`].
//!
//! Path parameters and query strings always arrive as strings, so they are validated
//! with [`ValidateOptions::coerce`]: string leaves are converted to the primitive type
//! their property declares before the structural checks run.
//!
//! # Example
//! ```
//! use serde_json::json;
//! use tusk::schema::{Schema, ValidateOptions, Validator};
//!
//! let schema = Schema::object().required("id", Schema::integer()).optional("verbose", Schema::boolean()).build();
//! let validator = Validator::compile(&schema).unwrap();
//!
//! let value = validator.validate(json!({"id": "42", "verbose": "true"}), ValidateOptions::coerce()).unwrap();
//! assert_eq!(value, json!({"id": 42, "verbose": true}));
//! ```

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// A JSON Schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema(Value);

impl Schema {
    /// Starts an object schema, see [`ObjectSchema`].
    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    pub fn string() -> Self {
        Self(serde_json::json!({"type": "string"}))
    }

    pub fn integer() -> Self {
        Self(serde_json::json!({"type": "integer"}))
    }

    pub fn number() -> Self {
        Self(serde_json::json!({"type": "number"}))
    }

    pub fn boolean() -> Self {
        Self(serde_json::json!({"type": "boolean"}))
    }

    /// An ISO 8601 / RFC 3339 timestamp carried as a string.
    pub fn date_time() -> Self {
        Self(serde_json::json!({"type": "string", "format": "date-time"}))
    }

    pub fn array(items: Schema) -> Self {
        Self(serde_json::json!({"type": "array", "items": items.0}))
    }

    /// A value restricted to one of `values`.
    pub fn one_of_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        Self(serde_json::json!({"enum": values}))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Property names of an object schema, `None` when this is not an object schema.
    pub fn property_names(&self) -> Option<Vec<&str>> {
        self.0.get("properties")?.as_object().map(|props| props.keys().map(String::as_str).collect())
    }
}

impl From<Value> for Schema {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(object: ObjectSchema) -> Self {
        object.build()
    }
}

/// Builder for object schemas, one field at a time.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ObjectSchema {
    /// Adds a field that must be present.
    pub fn required(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema.into().0);
        self.required.push(name);
        self
    }

    /// Adds a field that may be absent.
    pub fn optional(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.properties.insert(name.into(), schema.into().0);
        self
    }

    pub fn build(self) -> Schema {
        Schema(serde_json::json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        }))
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema does not compile: {0}")]
    Compile(String),
}

/// Options of a single [`Validator::validate`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    coerce: bool,
}

impl ValidateOptions {
    /// Validate values as they are.
    pub fn strict() -> Self {
        Self { coerce: false }
    }

    /// Convert string leaves to their declared primitive type first.
    pub fn coerce() -> Self {
        Self { coerce: true }
    }

    pub fn is_coerce(&self) -> bool {
        self.coerce
    }
}

/// A compiled schema.
pub struct Validator {
    schema: Value,
    compiled: JSONSchema,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").field("schema", &self.schema).finish_non_exhaustive()
    }
}

impl Validator {
    pub fn compile(schema: &Schema) -> Result<Self, SchemaError> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema.0)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;

        Ok(Self { schema: schema.0.clone(), compiled })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validates `value`, returning the (coerced, stripped) value or every violation found.
    ///
    /// Undeclared top level keys are dropped when the schema declares `properties`
    /// and says nothing about `additionalProperties`.
    pub fn validate(&self, value: Value, options: ValidateOptions) -> Result<Value, Vec<ValidationError>> {
        let value = if options.coerce { coerce_properties(&self.schema, value) } else { value };
        let value = strip_undeclared(&self.schema, value);

        if let Err(errors) = self.compiled.validate(&value) {
            return Err(errors.map(|error| self.convert(&error)).collect());
        }

        Ok(value)
    }

    fn convert(&self, error: &jsonschema::ValidationError<'_>) -> ValidationError {
        let path = error
            .instance_path
            .to_string()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
            .collect::<Vec<_>>();

        if let ValidationErrorKind::Required { property } = &error.kind {
            let property = property.as_str().map_or_else(|| property.to_string(), str::to_string);
            let mut full_path = path;
            full_path.push(property);
            return ValidationError {
                code: ValidationErrorCode::MissingRequired,
                type_name: type_name(subschema_at(&self.schema, &full_path)),
                key: full_path.join("."),
                message: None,
            };
        }

        ValidationError {
            code: ValidationErrorCode::Invalid,
            type_name: type_name(subschema_at(&self.schema, &path)),
            key: path.join("."),
            message: Some(error.to_string()),
        }
    }
}

/// Walks `properties` / `items` down to the schema describing `path`.
fn subschema_at<'a>(schema: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(schema, |current, segment| {
        current
            .get("properties")
            .and_then(|props| props.get(segment))
            .or_else(|| current.get("items").filter(|_| segment.parse::<usize>().is_ok()))
    })
}

fn type_name(schema: Option<&Value>) -> String {
    let Some(schema) = schema else {
        return "any".to_string();
    };
    if let Some(format) = schema.get("format").and_then(Value::as_str) {
        return format.to_string();
    }
    match schema.get("type") {
        Some(Value::String(ty)) => ty.clone(),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("|"),
        _ if schema.get("enum").is_some() => "enum".to_string(),
        _ => "any".to_string(),
    }
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(ty)) => vec![ty.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => vec![],
    }
}

fn coerce_properties(schema: &Value, value: Value) -> Value {
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return value;
    };
    let Value::Object(map) = value else {
        return value;
    };

    let coerced = map
        .into_iter()
        .map(|(key, value)| match props.get(&key) {
            Some(prop) => {
                let value = coerce_leaf(prop, value);
                (key, value)
            }
            None => (key, value),
        })
        .collect();
    Value::Object(coerced)
}

/// Coerces a string (or a list of strings for array properties) into the declared primitive.
fn coerce_leaf(schema: &Value, value: Value) -> Value {
    let types = declared_types(schema);

    if types.contains(&"array") {
        let items = schema.get("items").unwrap_or(&Value::Null);
        return match value {
            Value::Array(values) => Value::Array(values.into_iter().map(|v| coerce_primitive(items, v)).collect()),
            Value::String(s) => Value::Array(vec![coerce_primitive(items, Value::String(s))]),
            other => other,
        };
    }

    coerce_primitive(schema, value)
}

fn coerce_primitive(schema: &Value, value: Value) -> Value {
    let Value::String(raw) = &value else {
        return value;
    };
    let types = declared_types(schema);
    if types.contains(&"string") {
        return value;
    }

    for ty in types {
        let coerced = match ty {
            "integer" => raw.parse::<i64>().ok().map(Value::from),
            "number" => raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
            "boolean" => match raw.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };
        if let Some(coerced) = coerced {
            return coerced;
        }
    }
    value
}

fn strip_undeclared(schema: &Value, value: Value) -> Value {
    if schema.get("additionalProperties").is_some() {
        return value;
    }
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return value;
    };
    let Value::Object(map) = value else {
        return value;
    };
    Value::Object(map.into_iter().filter(|(key, _)| props.contains_key(key)).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    MissingRequired,
    Invalid,
}

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ValidationErrorCode,
    /// Dotted path of the offending field, empty for the value itself.
    pub key: String,
    /// Expected type name, e.g. `integer` or `date-time`.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationError {
    pub fn invalid(key: impl Into<String>, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ValidationErrorCode::Invalid,
            key: key.into(),
            type_name: type_name.into(),
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorCode::MissingRequired => f.write_str("missing_required"),
            ValidationErrorCode::Invalid => f.write_str("invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Schema, ValidateOptions, ValidationErrorCode, Validator};
    use serde_json::json;

    fn echo_query() -> Validator {
        let schema = Schema::object().required("message", Schema::string()).optional("date", Schema::date_time());
        Validator::compile(&schema.build()).unwrap()
    }

    #[test]
    fn test_coerce_primitives() {
        let schema = Schema::object()
            .required("id", Schema::integer())
            .required("ratio", Schema::number())
            .required("flag", Schema::boolean())
            .required("name", Schema::string());
        let validator = Validator::compile(&schema.into()).unwrap();

        let value = validator
            .validate(json!({"id": "42", "ratio": "0.5", "flag": "false", "name": "7"}), ValidateOptions::coerce())
            .unwrap();
        assert_eq!(value, json!({"id": 42, "ratio": 0.5, "flag": false, "name": "7"}));
    }

    #[test]
    fn test_strict_does_not_coerce() {
        let validator = Validator::compile(&Schema::object().required("id", Schema::integer()).build()).unwrap();

        let errors = validator.validate(json!({"id": "42"}), ValidateOptions::strict()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ValidationErrorCode::Invalid);
        assert_eq!(errors[0].key, "id");
        assert_eq!(errors[0].type_name, "integer");
    }

    #[test]
    fn test_coerce_leaves_structure_alone() {
        let schema = Schema::from(json!({
            "type": "object",
            "properties": {
                "inner": {"type": "object", "properties": {"n": {"type": "integer"}}}
            }
        }));
        let validator = Validator::compile(&schema).unwrap();

        let errors = validator.validate(json!({"inner": {"n": "1"}}), ValidateOptions::coerce()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, "inner.n");
        assert_eq!(errors[0].type_name, "integer");

        let errors = validator.validate(json!({"inner": "{}"}), ValidateOptions::coerce()).unwrap_err();
        assert_eq!(errors[0].key, "inner");
        assert_eq!(errors[0].type_name, "object");
    }

    #[test]
    fn test_coerce_repeated_query_keys() {
        let schema = Schema::object().required("tag", Schema::array(Schema::integer()));
        let validator = Validator::compile(&schema.build()).unwrap();

        let single = validator.validate(json!({"tag": "1"}), ValidateOptions::coerce()).unwrap();
        assert_eq!(single, json!({"tag": [1]}));

        let many = validator.validate(json!({"tag": ["1", "2"]}), ValidateOptions::coerce()).unwrap();
        assert_eq!(many, json!({"tag": [1, 2]}));
    }

    #[test]
    fn test_missing_required() {
        let errors = echo_query().validate(json!({}), ValidateOptions::coerce()).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ValidationErrorCode::MissingRequired);
        assert_eq!(errors[0].key, "message");
        assert_eq!(errors[0].type_name, "string");
        assert_eq!(errors[0].message, None);
    }

    #[test]
    fn test_invalid_date() {
        let input = json!({"message": "foo", "date": "invalid-date"});
        let errors = echo_query().validate(input, ValidateOptions::coerce()).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ValidationErrorCode::Invalid);
        assert_eq!(errors[0].key, "date");
        assert_eq!(errors[0].type_name, "date-time");
        assert!(errors[0].message.is_some());
    }

    #[test]
    fn test_reports_every_violation() {
        let schema = Schema::object()
            .required("id", Schema::integer())
            .required("name", Schema::string())
            .optional("kind", Schema::one_of_values(["cat", "dog"]));
        let validator = Validator::compile(&schema.build()).unwrap();

        let errors = validator.validate(json!({"id": "abc", "kind": "bird"}), ValidateOptions::coerce()).unwrap_err();
        assert_eq!(errors.len(), 3);

        let mut keys = errors.iter().map(|e| (e.key.as_str(), e.code)).collect::<Vec<_>>();
        keys.sort_by_key(|(key, _)| *key);
        assert_eq!(
            keys,
            [
                ("id", ValidationErrorCode::Invalid),
                ("kind", ValidationErrorCode::Invalid),
                ("name", ValidationErrorCode::MissingRequired),
            ]
        );
        let kind = errors.iter().find(|e| e.key == "kind").unwrap();
        assert_eq!(kind.type_name, "enum");
    }

    #[test]
    fn test_idempotent_on_valid_values() {
        let validator = echo_query();
        let valid = json!({"message": "hello", "date": "2020-01-01T00:00:00Z"});

        let once = validator.validate(valid.clone(), ValidateOptions::coerce()).unwrap();
        assert_eq!(once, valid);
        let twice = validator.validate(once.clone(), ValidateOptions::strict()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_strips_undeclared_keys() {
        let value = echo_query().validate(json!({"message": "hi", "extra": "1"}), ValidateOptions::coerce()).unwrap();
        assert_eq!(value, json!({"message": "hi"}));
    }

    #[test]
    fn test_non_object_values_pass_through() {
        let errors = echo_query().validate(json!("hello"), ValidateOptions::coerce()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, "");
        assert_eq!(errors[0].type_name, "object");

        let validator = Validator::compile(&Schema::array(Schema::integer())).unwrap();
        let value = validator.validate(json!([1, 2]), ValidateOptions::coerce()).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_explicit_additional_properties_is_enforced() {
        let schema = Schema::from(json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        }));
        let validator = Validator::compile(&schema).unwrap();

        let errors = validator.validate(json!({"a": "x", "b": "y"}), ValidateOptions::strict()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ValidationErrorCode::Invalid);
        assert_eq!(errors[0].key, "");
    }

    #[test]
    fn test_invalid_schema() {
        let schema = Schema::from(json!({"type": "string", "pattern": "(unclosed"}));
        assert!(Validator::compile(&schema).is_err());
    }

    #[test]
    fn test_property_names() {
        let schema = Schema::object().required("a", Schema::string()).optional("b", Schema::integer()).build();
        let mut names = schema.property_names().unwrap();
        names.sort_unstable();
        assert_eq!(names, ["a", "b"]);

        assert!(Schema::string().property_names().is_none());
    }

    #[test]
    fn test_error_serialization() {
        let errors = echo_query().validate(json!({"date": "nope"}), ValidateOptions::coerce()).unwrap_err();
        let missing = errors.iter().find(|e| e.key == "message").unwrap();

        assert_eq!(
            serde_json::to_value(missing).unwrap(),
            json!({"code": "missing_required", "key": "message", "type": "string"})
        );
    }
}
