//! Multi-file configuration loading.
//!
//! A configuration file may list other files under `include`. Included files
//! are merged section by section; a top-level section defined in two files is
//! an error, and so is a file that ends up including itself.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a configuration file together with its includes.
pub struct ConfigLoader {
	/// Directory relative includes are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, for cycle detection.
	loaded_files: HashSet<PathBuf>,
	/// Which file defined each top-level section.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads `config_path`, merges its includes and validates the result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let mut root = self.read_table(&config_path).await?;

		let includes = extract_includes(&root)?;
		root.remove("include");
		for key in root.keys() {
			self.section_sources
				.insert(key.clone(), config_path.clone());
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let table = self.read_table(&include_path).await?;

			for (key, value) in table {
				if key == "include" {
					return Err(ConfigError::Validation(format!(
						"Nested includes are not supported ({})",
						include_path.display()
					)));
				}
				if let Some(existing) = self.section_sources.get(&key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing.display(),
						include_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), include_path.clone());
				root.insert(key, value);
			}
		}

		Config::from_table(root)
	}

	/// Reads a file once, resolving environment variables before parsing.
	async fn read_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// Reads `include` as a single path or an array of paths.
fn extract_includes(table: &toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
	match table.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
