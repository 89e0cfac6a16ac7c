//! The document walker: three fixed phases over a node list, re-entered
//! recursively for cloned loop content and table cells.
//!
//! Phase order within one list: conditional blocks deepest-first, then
//! loop blocks in document order, then placeholders in surviving
//! paragraphs and a recursive descent into tables.

use crate::conditional;
use crate::context::EvaluationContext;
use crate::detect::{
    detect_conditionals, detect_loops, is_marker_paragraph_text,
};
use crate::document::{is_attached, Paragraph, SyntaxNode, Table, TableRow};
use crate::lex::SyntaxKind::{PARAGRAPH, TABLE, TABLE_ROW};
use crate::loops;
use crate::placeholder;
use crate::process::{
    ProcessOptions, ProcessResult, ProcessingWarning, TemplateError, WarningKind,
};
use rowan::ast::AstNode;
use std::collections::BTreeSet;

/// Whether a walk runs over nodes of the original document or over a
/// cloned sub-tree; a cloned walk does not consult parent attachment to
/// skip blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WalkMode {
    Attached,
    Cloned,
}

/// Mutable state of one processing run: the options and everything that
/// ends up in the result.
pub(crate) struct Walk<'a> {
    pub(crate) options: &'a ProcessOptions,
    replacement_count: usize,
    missing_variables: BTreeSet<String>,
    warnings: Vec<ProcessingWarning>,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(options: &'a ProcessOptions) -> Walk<'a> {
        Walk {
            options,
            replacement_count: 0,
            missing_variables: BTreeSet::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(
        &mut self,
        kind: WarningKind,
        variable_name: &str,
        context: &str,
        message: String,
    ) {
        self.warnings.push(ProcessingWarning {
            kind,
            variable_name: variable_name.to_owned(),
            context: context.to_owned(),
            message,
        });
    }

    pub(crate) fn record_missing(&mut self, name: &str, context: &str) {
        self.missing_variables.insert(name.to_owned());
        self.warn(
            WarningKind::MissingVariable,
            name,
            context,
            format!("variable '{}' was not found", name),
        );
    }

    pub(crate) fn count_replacement(&mut self) {
        self.replacement_count += 1;
    }

    pub(crate) fn into_result(self, outcome: Result<(), TemplateError>) -> ProcessResult {
        let (is_success, error_message) = match outcome {
            Ok(()) => (true, None),
            Err(err) => (false, Some(err.to_string())),
        };
        ProcessResult {
            is_success,
            replacement_count: self.replacement_count,
            missing_variables: self.missing_variables,
            warnings: self.warnings,
            error_message,
        }
    }

    fn live_nodes(&self, nodes: &[SyntaxNode], mode: WalkMode) -> Vec<SyntaxNode> {
        match mode {
            WalkMode::Attached => nodes.iter().filter(|&n| is_attached(n)).cloned().collect(),
            WalkMode::Cloned => nodes.to_vec(),
        }
    }

    /// Walk one node list with the composite visitor.
    pub(crate) fn walk_nodes(
        &mut self,
        nodes: &[SyntaxNode],
        context: &dyn EvaluationContext,
        mode: WalkMode,
    ) -> Result<(), TemplateError> {
        if nodes.iter().any(|n| n.kind() == TABLE_ROW) {
            // cloned table-row content re-enters through the row walk
            return self.walk_rows(nodes, context, mode);
        }

        // conditionals, deepest-first, stable in document order
        let live = self.live_nodes(nodes, mode);
        let mut blocks = detect_conditionals(&live, false)?;
        blocks.sort_by_key(|b| std::cmp::Reverse(b.nesting_level));
        for block in &blocks {
            if mode == WalkMode::Attached
                && !(is_attached(&block.branches[0].marker) && is_attached(&block.end_marker))
            {
                continue;
            }
            if block.is_inline() {
                if let Some(paragraph) = Paragraph::cast(block.end_marker.clone()) {
                    conditional::apply_inline(self, &paragraph, context)?;
                }
            } else {
                conditional::apply_block(self, block, context)?;
            }
        }

        // loops, in document order
        let live = self.live_nodes(nodes, mode);
        let loop_blocks = detect_loops(&live, false)?;
        for block in &loop_blocks {
            if mode == WalkMode::Attached
                && !(is_attached(&block.start_marker) && is_attached(&block.end_marker))
            {
                continue;
            }
            if block.is_inline() {
                if let Some(paragraph) = Paragraph::cast(block.end_marker.clone()) {
                    loops::apply_inline(self, &paragraph, context)?;
                }
            } else {
                loops::apply_block(self, block, context)?;
            }
        }

        // placeholders in surviving paragraphs, recursion into tables
        for node in self.live_nodes(nodes, mode) {
            match node.kind() {
                PARAGRAPH => {
                    if let Some(paragraph) = Paragraph::cast(node) {
                        if !is_marker_paragraph_text(&paragraph.inner_text()) {
                            placeholder::apply_paragraph(self, &paragraph, context)?;
                        }
                    }
                }
                TABLE => {
                    if let Some(table) = Table::cast(node) {
                        self.walk_table(&table, context, mode)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_table(
        &mut self,
        table: &Table,
        context: &dyn EvaluationContext,
        mode: WalkMode,
    ) -> Result<(), TemplateError> {
        let rows: Vec<SyntaxNode> = table.rows().map(|r| r.syntax().clone()).collect();
        self.walk_rows(&rows, context, mode)
    }

    /// Walk the rows of a table: row-level conditionals and loops first,
    /// then the cells of every surviving row.
    fn walk_rows(
        &mut self,
        rows: &[SyntaxNode],
        context: &dyn EvaluationContext,
        mode: WalkMode,
    ) -> Result<(), TemplateError> {
        let live = self.live_nodes(rows, mode);
        let mut blocks = detect_conditionals(&live, true)?;
        blocks.sort_by_key(|b| std::cmp::Reverse(b.nesting_level));
        for block in &blocks {
            if mode == WalkMode::Attached
                && !(is_attached(&block.branches[0].marker) && is_attached(&block.end_marker))
            {
                continue;
            }
            conditional::apply_block(self, block, context)?;
        }

        let live = self.live_nodes(rows, mode);
        let loop_blocks = detect_loops(&live, true)?;
        for block in &loop_blocks {
            if mode == WalkMode::Attached
                && !(is_attached(&block.start_marker) && is_attached(&block.end_marker))
            {
                continue;
            }
            loops::apply_block(self, block, context)?;
        }

        for node in self.live_nodes(rows, mode) {
            if let Some(row) = TableRow::cast(node) {
                for cell in row.cells() {
                    self.walk_nodes(&cell.block_elements(), context, mode)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Document;
    use crate::process::{ProcessResult, TemplateProcessor};

    fn process(doc: &Document, json: &str) -> ProcessResult {
        TemplateProcessor::default().process_json(doc, json).unwrap()
    }

    fn doc_with_paragraphs(texts: &[&str]) -> Document {
        let mut body = String::new();
        for text in texts {
            body.push_str(&format!(
                "<w:p><w:r><w:t>{}</w:t></w:r></w:p>",
                crate::document::escape_text(text)
            ));
        }
        format!("<w:document><w:body>{}</w:body></w:document>", body)
            .parse()
            .unwrap()
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.body()
            .unwrap()
            .paragraphs()
            .map(|p| p.inner_text())
            .collect()
    }

    #[test]
    fn test_deepest_first_inner_conditional_resolves_inside_outer() {
        let doc = doc_with_paragraphs(&[
            "{{#if Outer}}",
            "a",
            "{{#if Inner}}",
            "b",
            "{{/if}}",
            "c",
            "{{/if}}",
        ]);
        let result = process(&doc, r#"{ "Outer": true, "Inner": false }"#);
        assert!(result.is_success);
        assert_eq!(texts(&doc), vec!["a".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn test_outer_false_removes_inner_entirely() {
        let doc = doc_with_paragraphs(&[
            "{{#if Outer}}",
            "{{#if Inner}}",
            "b",
            "{{/if}}",
            "{{/if}}",
            "tail",
        ]);
        let result = process(&doc, r#"{ "Outer": false, "Inner": true }"#);
        assert!(result.is_success);
        assert_eq!(texts(&doc), vec!["tail".to_owned()]);
    }

    #[test]
    fn test_loop_after_conditional_in_same_list() {
        let doc = doc_with_paragraphs(&[
            "{{#if Show}}",
            "head",
            "{{/if}}",
            "{{#foreach Items}}",
            "{{.}}",
            "{{/foreach}}",
        ]);
        let result = process(&doc, r#"{ "Show": true, "Items": ["x", "y"] }"#);
        assert!(result.is_success, "{:?}", result.error_message);
        assert_eq!(
            texts(&doc),
            vec!["head".to_owned(), "x".to_owned(), "y".to_owned()]
        );
    }

    #[test]
    fn test_loop_inside_dead_branch_never_runs() {
        let doc = doc_with_paragraphs(&[
            "{{#if Show}}",
            "{{#foreach Items}}",
            "{{.}}",
            "{{/foreach}}",
            "{{/if}}",
        ]);
        // Items is a string: iterating it would be a hard error, but the
        // dead branch removes the loop before phase 2 sees it
        let result = process(&doc, r#"{ "Show": false, "Items": "oops" }"#);
        assert!(result.is_success, "{:?}", result.error_message);
        assert!(texts(&doc).is_empty());
    }

    #[test]
    fn test_marker_paragraph_placeholders_not_substituted() {
        let doc = doc_with_paragraphs(&["{{#if X}}", "{{X}}", "{{/if}}"]);
        let result = process(&doc, r#"{ "X": "value" }"#);
        assert!(result.is_success);
        assert_eq!(texts(&doc), vec!["value".to_owned()]);
    }

    #[test]
    fn test_nested_table_in_cell() {
        let body = concat!(
            "<w:tbl><w:tr><w:tc>",
            "<w:p><w:r><w:t>{{Outer}}</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{{Inner}}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "</w:tc></w:tr></w:tbl>"
        );
        let doc: Document = format!("<w:document><w:body>{}</w:body></w:document>", body)
            .parse()
            .unwrap();
        let result = process(&doc, r#"{ "Outer": "o", "Inner": "i" }"#);
        assert!(result.is_success);
        assert_eq!(result.replacement_count, 2);
        let table = doc.body().unwrap().tables().next().unwrap();
        assert_eq!(table.rows().next().unwrap().inner_text(), "oi");
    }
}
