#![allow(clippy::type_complexity)]
//! Lossless template engine for Word documents.
//!
//! The engine fills `{{…}}` markers embedded in a document's
//! `document.xml` part: variable placeholders, `{{#if}}` conditionals
//! and `{{#foreach}}` loops, nested to arbitrary depth. Everything the
//! markers do not touch is preserved byte-faithfully, character
//! formatting included. The tree is parsed with [rowan], the same
//! lossless-syntax-tree library used by rust-analyzer.
//!
//! The ZIP container and the other document parts are the concern of a
//! separate layer: this crate consumes the part through
//! [`Document::read`]/[`Document::from_str`] and hands it back through
//! [`Document::write_to`]/`to_string()`.
//!
//! # Example
//!
//! ```rust
//! use docx_template::{Document, ProcessOptions, TemplateProcessor, Value};
//! use std::str::FromStr;
//!
//! let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello {{Name}}, you have {{#if Unread}}mail{{else}}no mail{{/if}}.</w:t></w:r></w:p></w:body></w:document>"#;
//!
//! let doc = Document::from_str(xml).unwrap();
//! let processor = TemplateProcessor::new(ProcessOptions::default());
//! let data = Value::parse_data(r#"{ "Name": "Ada", "Unread": true }"#).unwrap();
//!
//! let result = processor.process(&doc, &data);
//! assert!(result.is_success);
//! assert_eq!(result.replacement_count, 1);
//! assert!(doc.to_string().contains("Hello Ada, you have mail."));
//! ```

mod conditional;
mod context;
mod detect;
mod document;
mod expr;
mod lex;
mod loops;
mod path;
mod placeholder;
mod process;
mod style;
mod value;
mod walker;

pub use context::{EvaluationContext, GlobalContext, LoopContext, LoopScope};
pub use detect::{find_placeholders, ConditionalBlock, ConditionalBranch, LoopBlock, PlaceholderMatch};
pub use document::{
    Body, Break, Document, Error, Paragraph, ParseError, Run, RunProperties, Tab, Table, TableCell,
    TableRow, Text,
};
pub use process::{
    BooleanFormatters, MissingVariableBehavior, ProcessOptions, ProcessResult, ProcessingWarning,
    TemplateError, TemplateProcessor, UpdateFields, WarningKind,
};
pub use value::{Culture, Value};
