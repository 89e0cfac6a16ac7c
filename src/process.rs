//! The outer processor: options, result surface, and the entry points
//! that tie the walker to a document and its data.

use crate::context::GlobalContext;
use crate::document::Document;
use crate::value::{Culture, Value};
use crate::walker::{Walk, WalkMode};
use std::collections::BTreeMap;

/// What a placeholder does when its variable is not bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MissingVariableBehavior {
    #[default]
    LeaveUnchanged,
    ReplaceWithEmpty,
    ThrowException,
}

/// Hint for the container layer: whether the consumer application should
/// refresh fields when it opens the produced document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum UpdateFields {
    #[default]
    Never,
    Always,
    Auto,
}

/// Named boolean renderings selectable with a `{{Flag:name}}` format
/// specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanFormatters {
    formatters: BTreeMap<String, (String, String)>,
}

impl BooleanFormatters {
    /// An empty registry.
    pub fn empty() -> BooleanFormatters {
        BooleanFormatters {
            formatters: BTreeMap::new(),
        }
    }

    /// Register a formatter; the name is matched case-insensitively.
    pub fn insert(&mut self, name: &str, true_text: &str, false_text: &str) {
        self.formatters.insert(
            name.to_ascii_lowercase(),
            (true_text.to_owned(), false_text.to_owned()),
        );
    }

    pub fn get(&self, name: &str) -> Option<(&str, &str)> {
        self.formatters
            .get(&name.to_ascii_lowercase())
            .map(|(t, f)| (t.as_str(), f.as_str()))
    }

    pub fn format(&self, name: &str, value: bool) -> Option<String> {
        self.get(name)
            .map(|(t, f)| if value { t } else { f }.to_owned())
    }
}

impl Default for BooleanFormatters {
    fn default() -> Self {
        let mut registry = BooleanFormatters::empty();
        registry.insert("checkbox", "\u{2612}", "\u{2610}");
        registry.insert("yesno", "Yes", "No");
        registry.insert("checkmark", "\u{2714}", "\u{2718}");
        registry.insert("truefalse", "True", "False");
        registry.insert("onoff", "On", "Off");
        registry.insert("enabled", "Enabled", "Disabled");
        registry.insert("active", "Active", "Inactive");
        registry
    }
}

/// Processing options; the defaults match what templates usually want.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub missing_variable_behavior: MissingVariableBehavior,
    pub culture: Culture,
    pub enable_newline_support: bool,
    pub boolean_formatters: BooleanFormatters,
    pub update_fields_on_open: UpdateFields,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            missing_variable_behavior: MissingVariableBehavior::default(),
            culture: Culture::invariant(),
            enable_newline_support: true,
            boolean_formatters: BooleanFormatters::default(),
            update_fields_on_open: UpdateFields::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WarningKind {
    MissingVariable,
    MissingLoopCollection,
    NullLoopCollection,
    ExpressionFailed,
}

/// A recoverable problem encountered during processing. Warnings
/// accumulate but never abort a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessingWarning {
    pub kind: WarningKind,
    pub variable_name: String,
    pub context: String,
    pub message: String,
}

/// The outcome of one processing call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessResult {
    pub is_success: bool,
    pub replacement_count: usize,
    pub missing_variables: std::collections::BTreeSet<String>,
    pub warnings: Vec<ProcessingWarning>,
    pub error_message: Option<String>,
}

/// A hard failure: the template is structurally unusable under the
/// current data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Unbalanced or malformed block markers.
    Syntax(String),

    /// A loop collection resolved to something that cannot be iterated.
    NonIterable(String),

    /// A variable was missing under `ThrowException`.
    MissingVariable(String),
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TemplateError::Syntax(msg) => write!(f, "template syntax error: {}", msg),
            TemplateError::NonIterable(name) => {
                write!(f, "loop collection '{}' is not iterable", name)
            }
            TemplateError::MissingVariable(name) => {
                write!(f, "missing variable '{}'", name)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Fills a document's markers from data, in place.
///
/// The processor itself is stateless between calls; distinct documents
/// may be processed from distinct threads with the same options.
///
/// # Example
///
/// ```rust
/// use docx_template::{Document, ProcessOptions, TemplateProcessor, Value};
/// use std::str::FromStr;
///
/// let doc = Document::from_str(
///     "<w:document><w:body><w:p><w:r><w:t>Hello {{Name}}!</w:t></w:r></w:p></w:body></w:document>",
/// )
/// .unwrap();
/// let processor = TemplateProcessor::new(ProcessOptions::default());
/// let data = Value::parse_data(r#"{ "Name": "Ada" }"#).unwrap();
/// let result = processor.process(&doc, &data);
/// assert!(result.is_success);
/// assert_eq!(result.replacement_count, 1);
/// assert!(doc.to_string().contains("Hello Ada!"));
/// ```
pub struct TemplateProcessor {
    options: ProcessOptions,
}

impl TemplateProcessor {
    pub fn new(options: ProcessOptions) -> TemplateProcessor {
        TemplateProcessor { options }
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// The `update_fields_on_open` setting, for the container layer to
    /// write into the settings part; the engine never touches container
    /// metadata itself.
    pub fn update_fields_hint(&self) -> UpdateFields {
        self.options.update_fields_on_open
    }

    /// Rewrite the document's markers from a data tree.
    pub fn process(&self, document: &Document, data: &Value) -> ProcessResult {
        let mut walk = Walk::new(&self.options);
        let outcome = match document.body() {
            Some(body) => {
                let nodes = body.block_elements();
                let context = GlobalContext::new(data);
                walk.walk_nodes(&nodes, &context, WalkMode::Attached)
            }
            None => Ok(()),
        };
        walk.into_result(outcome)
    }

    /// Rewrite the document's markers from the JSON text form of the
    /// data.
    pub fn process_json(
        &self,
        document: &Document,
        json: &str,
    ) -> Result<ProcessResult, serde_json::Error> {
        let data = Value::parse_data(json)?;
        Ok(self.process(document, &data))
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        TemplateProcessor::new(ProcessOptions::default())
    }
}
