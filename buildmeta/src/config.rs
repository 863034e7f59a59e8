// SPDX-License-Identifier: GPL-3.0-or-later

//! This module defines the configuration of the application.
//!
//! The configuration is either loaded from a file or used with default
//! values, which are defined in the code. It holds the static data the
//! parsing engine needs at startup: extra tool signatures, the detection
//! conventions, the response file rules and the project source root.
//!
//! The configuration file syntax is based on the YAML format.
//! The default configuration file name is `buildmeta.yml`.
//!
//! The configuration file location is searched in the following order:
//! 1. The current working directory
//! 2. The local configuration directory of the user
//! 3. The configuration directory of the user
//! 4. The local configuration directory of the application
//! 5. The configuration directory of the application
//!
//! ```yaml
//! schema: 1.0
//!
//! detection:
//!   version_suffix: "-?\\d+(\\.\\d+)*"
//!   windows_conventions: false
//!
//! response_files:
//!   marker: "@"
//!   max_depth: 8
//!
//! diagnostics:
//!   source_root: /opt/project
//!
//! tools:
//!   - name: "my-cross-cc"
//!     as: gcc
//!   - name: "nvcc-wrapper"
//!     as: nvcc
//!     match_extension: true
//! ```

// Re-Export the types and the loader module content.
pub use loader::{ConfigError, Loader};
pub use types::*;
pub use validation::{ValidationError, Validator};

mod types {
    use serde::de;
    use std::fmt;
    use std::path::PathBuf;

    pub const SUPPORTED_SCHEMA_VERSION: &str = "1.0";

    /// Represents the application configuration.
    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Main {
        #[serde(deserialize_with = "validate_schema_version")]
        pub schema: String,
        #[serde(default)]
        pub detection: Detection,
        #[serde(default)]
        pub response_files: ResponseFileOptions,
        #[serde(default)]
        pub diagnostics: Diagnostics,
        #[serde(default)]
        pub tools: Vec<Tool>,
    }

    impl Default for Main {
        fn default() -> Self {
            Self {
                schema: String::from(SUPPORTED_SCHEMA_VERSION),
                detection: Detection::default(),
                response_files: ResponseFileOptions::default(),
                diagnostics: Diagnostics::default(),
                tools: vec![],
            }
        }
    }

    impl fmt::Display for Main {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "Configuration:")?;
            let yaml_string = serde_saphyr::to_string(self).map_err(|_| fmt::Error)?;
            for line in yaml_string.lines() {
                writeln!(f, "{}", line)?;
            }
            Ok(())
        }
    }

    /// How the leading token of a command line is matched to a tool.
    #[derive(Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Detection {
        /// Appended to every signature, e.g. to accept `gcc-13`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub version_suffix: Option<String>,
        /// Accept `\` as directory separator and an optional `.exe` suffix.
        #[serde(default)]
        pub windows_conventions: bool,
    }

    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct ResponseFileOptions {
        #[serde(default = "default_marker")]
        pub marker: String,
        #[serde(default = "default_max_depth")]
        pub max_depth: usize,
    }

    impl Default for ResponseFileOptions {
        fn default() -> Self {
            Self { marker: default_marker(), max_depth: default_max_depth() }
        }
    }

    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Diagnostics {
        /// Script paths in the build output are relative to this directory.
        #[serde(default = "default_source_root")]
        pub source_root: PathBuf,
    }

    impl Default for Diagnostics {
        fn default() -> Self {
            Self { source_root: default_source_root() }
        }
    }

    /// A user defined tool signature. These are tried before the built-in ones.
    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Tool {
        /// Regular expression for the executable base name.
        pub name: String,
        #[serde(rename = "as")]
        pub as_: Family,
        #[serde(default)]
        pub match_extension: bool,
    }

    /// Compiler families with a known argument syntax.
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Family {
        #[serde(alias = "gnu")]
        Gcc,
        #[serde(alias = "llvm")]
        Clang,
        #[serde(alias = "cuda")]
        Nvcc,
        #[serde(alias = "icc", alias = "icx")]
        Intel,
        #[serde(alias = "cl")]
        Msvc,
    }

    impl fmt::Display for Family {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                Family::Gcc => "GCC",
                Family::Clang => "Clang",
                Family::Nvcc => "NVCC",
                Family::Intel => "Intel",
                Family::Msvc => "MSVC",
            };
            write!(f, "{}", name)
        }
    }

    fn default_marker() -> String {
        String::from("@")
    }

    fn default_max_depth() -> usize {
        8
    }

    fn default_source_root() -> PathBuf {
        PathBuf::from(".")
    }

    // The version is written as a bare YAML number most of the time.
    fn validate_schema_version<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SchemaVisitor;

        impl de::Visitor<'_> for SchemaVisitor {
            type Value = String;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a schema version like 1.0")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
                Ok(value.to_string())
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
                Ok(format!("{value:?}"))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
                Ok(format!("{value}.0"))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
                Ok(format!("{value}.0"))
            }
        }

        let schema = deserializer.deserialize_any(SchemaVisitor)?;
        if schema != SUPPORTED_SCHEMA_VERSION {
            use serde::de::Error;
            Err(Error::custom(format!(
                "Unsupported schema version: {schema}. Expected: {SUPPORTED_SCHEMA_VERSION}"
            )))
        } else {
            Ok(schema)
        }
    }
}

pub mod validation {

    use super::types::*;
    use regex::Regex;
    use std::collections::HashSet;
    use thiserror::Error;

    /// Trait for validating configuration objects
    pub trait Validator<T> {
        type Error: std::error::Error;

        fn validate(config: &T) -> Result<(), Self::Error>;
    }

    /// Validation errors for configuration
    #[derive(Debug, Error)]
    pub enum ValidationError {
        #[error("Empty string value for field '{field}'")]
        EmptyString { field: &'static str },
        #[error("Invalid regular expression for field '{field}': {message}")]
        InvalidPattern { field: &'static str, message: String },
        #[error("Value of field '{field}' must be at least {minimum}")]
        TooSmall { field: &'static str, minimum: usize },
        #[error("Duplicate {field} entry at: {idx}")]
        DuplicateEntry { field: &'static str, idx: usize },
        #[error("Multiple validation errors: {errors:?}")]
        Multiple { errors: Vec<ValidationError> },
    }

    /// Combinator for collecting and handling validation errors
    #[derive(Default)]
    struct ValidationCollector {
        errors: Vec<ValidationError>,
    }

    impl ValidationCollector {
        fn new() -> Self {
            Self { errors: Vec::new() }
        }

        fn add(&mut self, error: ValidationError) {
            self.errors.push(error);
        }

        fn add_result(&mut self, result: Result<(), ValidationError>) {
            if let Err(error) = result {
                match error {
                    ValidationError::Multiple { errors } => {
                        self.errors.extend(errors);
                    }
                    single_error => self.errors.push(single_error),
                }
            }
        }

        fn finish(mut self) -> Result<(), ValidationError> {
            match self.errors.len() {
                0 => Ok(()),
                1 => Err(self.errors.remove(0)),
                _ => Err(ValidationError::Multiple { errors: self.errors }),
            }
        }
    }

    fn check_pattern(field: &'static str, pattern: &str) -> Result<(), ValidationError> {
        Regex::new(pattern)
            .map(|_| ())
            .map_err(|error| ValidationError::InvalidPattern { field, message: error.to_string() })
    }

    impl Validator<Main> for Main {
        type Error = ValidationError;

        fn validate(config: &Main) -> Result<(), Self::Error> {
            let mut collector = ValidationCollector::new();

            collector.add_result(Detection::validate(&config.detection));
            collector.add_result(ResponseFileOptions::validate(&config.response_files));

            for tool in config.tools.iter() {
                collector.add_result(Tool::validate(tool));
            }

            // Check for duplicate tool names
            let mut seen_names = HashSet::new();
            for (idx, tool) in config.tools.iter().enumerate() {
                if !seen_names.insert(&tool.name) {
                    collector.add(ValidationError::DuplicateEntry { field: "tool", idx });
                }
            }

            collector.finish()
        }
    }

    impl Validator<Detection> for Detection {
        type Error = ValidationError;

        fn validate(config: &Detection) -> Result<(), Self::Error> {
            match &config.version_suffix {
                Some(suffix) if suffix.is_empty() => Err(ValidationError::EmptyString { field: "version_suffix" }),
                Some(suffix) => check_pattern("version_suffix", suffix),
                None => Ok(()),
            }
        }
    }

    impl Validator<ResponseFileOptions> for ResponseFileOptions {
        type Error = ValidationError;

        fn validate(config: &ResponseFileOptions) -> Result<(), Self::Error> {
            let mut collector = ValidationCollector::new();
            if config.marker.is_empty() {
                collector.add(ValidationError::EmptyString { field: "marker" });
            }
            if config.max_depth < 1 {
                collector.add(ValidationError::TooSmall { field: "max_depth", minimum: 1 });
            }
            collector.finish()
        }
    }

    impl Validator<Tool> for Tool {
        type Error = ValidationError;

        fn validate(config: &Tool) -> Result<(), Self::Error> {
            if config.name.is_empty() {
                Err(ValidationError::EmptyString { field: "name" })
            } else {
                check_pattern("name", &config.name)
            }
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;
        use std::path::PathBuf;

        fn tool(name: &str) -> Tool {
            Tool { name: name.to_string(), as_: Family::Gcc, match_extension: false }
        }

        #[test]
        fn test_validate_default_config() {
            assert!(Main::validate(&Main::default()).is_ok());
        }

        #[test]
        fn test_validate_detection() {
            let valid = Detection { version_suffix: Some(r"-?\d+".into()), windows_conventions: true };
            assert!(Detection::validate(&valid).is_ok());

            let invalid = Detection { version_suffix: Some("-(".into()), windows_conventions: false };
            match Detection::validate(&invalid) {
                Err(ValidationError::InvalidPattern { field, .. }) => assert_eq!(field, "version_suffix"),
                other => panic!("Expected InvalidPattern, got: {:?}", other),
            }

            let empty = Detection { version_suffix: Some(String::new()), windows_conventions: false };
            assert!(matches!(Detection::validate(&empty), Err(ValidationError::EmptyString { .. })));
        }

        #[test]
        fn test_validate_response_files() {
            let invalid = ResponseFileOptions { marker: String::new(), max_depth: 0 };

            match ResponseFileOptions::validate(&invalid) {
                Err(ValidationError::Multiple { errors }) => {
                    assert_eq!(errors.len(), 2);
                    assert!(matches!(errors[0], ValidationError::EmptyString { field: "marker" }));
                    assert!(matches!(errors[1], ValidationError::TooSmall { field: "max_depth", .. }));
                }
                other => panic!("Expected Multiple, got: {:?}", other),
            }
        }

        #[test]
        fn test_validate_tools() {
            let config = Main {
                tools: vec![tool("my-cc"), tool("[broken"), tool("my-cc"), tool("")],
                diagnostics: Diagnostics { source_root: PathBuf::from("/src") },
                ..Main::default()
            };

            match Main::validate(&config) {
                Err(ValidationError::Multiple { errors }) => {
                    assert_eq!(errors.len(), 3);
                    assert!(matches!(errors[0], ValidationError::InvalidPattern { field: "name", .. }));
                    assert!(matches!(errors[1], ValidationError::EmptyString { field: "name" }));
                    assert!(matches!(errors[2], ValidationError::DuplicateEntry { field: "tool", idx: 2 }));
                }
                other => panic!("Expected Multiple, got: {:?}", other),
            }
        }
    }
}

pub mod loader {
    use super::{Main, Validator};
    use directories::{BaseDirs, ProjectDirs};
    use log::{debug, info};
    use std::fs;
    use std::path::{Path, PathBuf};
    use thiserror::Error;

    const CONFIG_FILE_NAME: &str = "buildmeta.yml";

    pub struct Loader {}

    impl Loader {
        /// Loads the configuration from the specified file or the default locations.
        ///
        /// If the configuration file is specified, it will be used. Otherwise, the default locations
        /// will be searched for the configuration file. If the configuration file is not found, the
        /// default configuration will be returned.
        pub fn load(current_directory: &Path, filename: Option<&Path>) -> Result<Main, ConfigError> {
            if let Some(path) = filename {
                return Self::from_file(path);
            }
            for location in Self::file_locations(current_directory) {
                debug!("Checking configuration file: {}", location.display());
                if location.exists() {
                    return Self::from_file(location.as_path());
                }
            }
            debug!("Configuration file not found. Using the default configuration.");
            Ok(Main::default())
        }

        /// The default locations where the configuration file can be found.
        fn file_locations(current_directory: &Path) -> Vec<PathBuf> {
            let mut locations = vec![current_directory.to_path_buf()];
            if let Some(base_dirs) = BaseDirs::new() {
                locations.push(base_dirs.config_local_dir().to_path_buf());
                locations.push(base_dirs.config_dir().to_path_buf());
            }
            if let Some(proj_dirs) = ProjectDirs::from("com.github", "buildmeta", "buildmeta") {
                locations.push(proj_dirs.config_local_dir().to_path_buf());
                locations.push(proj_dirs.config_dir().to_path_buf());
            }
            locations.dedup();
            locations.iter().map(|p| p.join(CONFIG_FILE_NAME)).collect()
        }

        /// Loads the configuration from the specified file.
        pub fn from_file(path: &Path) -> Result<Main, ConfigError> {
            info!("Loading configuration file: {}", path.display());

            let content = fs::read_to_string(path)
                .map_err(|source| ConfigError::FileAccess { path: path.to_path_buf(), source })?;

            let config: Main = Self::from_str(&content)
                .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })?;

            Main::validate(&config)
                .map_err(|source| ConfigError::ValidationError { path: path.to_path_buf(), source })?;

            Ok(config)
        }

        /// Define the deserialization format of the config file.
        fn from_str<T>(content: &str) -> Result<T, serde_saphyr::Error>
        where
            T: serde::de::DeserializeOwned,
        {
            serde_saphyr::from_str(content)
        }
    }

    /// Represents all possible configuration-related errors.
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// Error when opening or reading a configuration file.
        #[error("Failed to access configuration file '{path}': {source}")]
        FileAccess {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        /// Error when parsing the configuration file format.
        #[error("Failed to parse configuration from file '{path}': {source}")]
        ParseError {
            path: PathBuf,
            #[source]
            source: serde_saphyr::Error,
        },
        /// Error when configuration validation fails.
        #[error("Configuration validation failed for '{path}': {source}")]
        ValidationError {
            path: PathBuf,
            #[source]
            source: crate::config::validation::ValidationError,
        },
    }

}
