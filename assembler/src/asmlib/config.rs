//! The language definition document.
//!
//! The document lives at the root of a language definition, in
//! [`DEFINITION_FILE_NAME`].  Only a few keys mean anything to the
//! engine (see [`LanguageSpecification`]); the whole document is also
//! kept so that handlers can look up keys of their own.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use super::types::ImplementationError;

pub const DEFINITION_FILE_NAME: &str = "Language_Specification.yaml";

fn default_load_path() -> String {
    "LanguageInstructionLib".to_string()
}

fn default_non_instruction_handler() -> String {
    "ProcessNonInstruction".to_string()
}

fn default_linker() -> String {
    "Linker".to_string()
}

fn default_output() -> String {
    "GenerateOutput".to_string()
}

fn default_alignment() -> usize {
    1
}

/// The engine's view of the definition document.  Keys are spelled
/// in PascalCase in the document (e.g. `LanguageLoadPath`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LanguageSpecification {
    /// Directory (relative to the language root) holding the handler
    /// modules.
    #[serde(default = "default_load_path")]
    pub language_load_path: String,
    /// Mnemonic to handler symbol.  Mnemonics are matched without
    /// regard to case.
    pub instruction_to_handler_name_map: BTreeMap<String, String>,
    #[serde(default = "default_non_instruction_handler")]
    pub non_instruction_handler: String,
    #[serde(default = "default_linker")]
    pub linker: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub before_compile: Option<String>,
    #[serde(default)]
    pub before_link: Option<String>,
    #[serde(default)]
    pub after_link: Option<String>,
    /// `AlignStartAddress` pads the output to a multiple of this many
    /// bits.
    #[serde(default = "default_alignment")]
    pub start_address_alignment: usize,
}

impl Default for LanguageSpecification {
    fn default() -> LanguageSpecification {
        LanguageSpecification {
            language_load_path: default_load_path(),
            instruction_to_handler_name_map: BTreeMap::new(),
            non_instruction_handler: default_non_instruction_handler(),
            linker: default_linker(),
            output: default_output(),
            before_compile: None,
            before_link: None,
            after_link: None,
            start_address_alignment: default_alignment(),
        }
    }
}

/// A parsed definition document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageConfig {
    specification: LanguageSpecification,
    document: Value,
}

impl LanguageConfig {
    /// Parse the text of a definition document.
    ///
    /// # Errors
    ///
    /// Fails if the text is not YAML, if a key the engine needs is
    /// missing or has the wrong type, or if the alignment is zero.
    pub fn parse(text: &str) -> Result<LanguageConfig, ImplementationError> {
        let document: Value = serde_yaml::from_str(text).map_err(|e| {
            ImplementationError::new(format!("{DEFINITION_FILE_NAME} is not valid YAML: {e}"))
        })?;
        let specification: LanguageSpecification = serde_yaml::from_value(document.clone())
            .map_err(|e| {
                ImplementationError::new(format!("{DEFINITION_FILE_NAME} is unusable: {e}"))
            })?;
        if specification.start_address_alignment == 0 {
            return Err(ImplementationError::new(
                "StartAddressAlignment must be at least 1",
            ));
        }
        Ok(LanguageConfig {
            specification,
            document,
        })
    }

    /// Read and parse the definition document of the language whose
    /// root directory is `language_root`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, or as for
    /// [`LanguageConfig::parse`].
    pub fn load(language_root: &Path) -> Result<LanguageConfig, ImplementationError> {
        let path = language_root.join(DEFINITION_FILE_NAME);
        let text = fs::read_to_string(&path).map_err(|e| {
            ImplementationError::new(format!(
                "failed to load configuration file {}: {e}",
                path.display()
            ))
        })?;
        LanguageConfig::parse(&text)
    }

    #[must_use]
    pub fn specification(&self) -> &LanguageSpecification {
        &self.specification
    }

    /// The whole document, including keys the engine ignores.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    #[must_use]
    pub fn alignment(&self) -> usize {
        self.specification.start_address_alignment
    }
}

/// Render a scalar document value as text.  Sequences, mappings and
/// null have no textual form.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
