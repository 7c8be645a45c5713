//! Validation of implementation-specific configuration tables.
//!
//! Wallet and receipt implementations receive their settings as raw TOML
//! tables. Each implementation describes the table it expects with a
//! [`Schema`], which is checked before the implementation is built.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
}

/// Extra check run on a field after its type matched.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field of a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Checks presence of required fields, then types and validators of
	/// every field that is present.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn check_type(
	field_name: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	let matches = match expected {
		FieldType::String => value.is_str(),
	};
	if matches {
		return Ok(());
	}

	Err(ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: "string".to_string(),
		actual: value.type_str().to_string(),
	})
}

/// Configuration schema owned by an implementation.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("private_key", FieldType::String)],
			vec![Field::new("resolver_url", FieldType::String)],
		)
	}

	#[test]
	fn test_missing_required_field() {
		let config: toml::Value = toml::from_str("resolver_url = \"http://node\"").unwrap();
		let err = schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "private_key"));
	}

	#[test]
	fn test_optional_field_type_is_checked() {
		let config: toml::Value =
			toml::from_str("private_key = \"0x01\"\nresolver_url = 8545").unwrap();
		let err = schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { field, .. } if field == "resolver_url"));
	}

	#[test]
	fn test_validator_runs() {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(s) if s.starts_with("http") => Ok(()),
					_ => Err("must be an http(s) url".to_string()),
				}
			})],
			vec![],
		);
		let config: toml::Value = toml::from_str("url = \"ftp://node\"").unwrap();
		assert!(schema.validate(&config).is_err());
		let config: toml::Value = toml::from_str("url = \"https://node\"").unwrap();
		assert!(schema.validate(&config).is_ok());
	}
}
