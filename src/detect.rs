//! Locating `{{…}}` markers in paragraph text and matching block
//! constructs over node lists.
//!
//! Detection is re-run from scratch by every walk: the produced blocks
//! hold references to live document nodes and are discarded as soon as a
//! visitor has processed them.

use crate::document::{Paragraph, SyntaxNode, Table, TableRow};
use crate::lex::SyntaxKind::{PARAGRAPH, TABLE, TABLE_ROW};
use crate::process::TemplateError;

/// A value-replacement marker found in paragraph text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    pub variable_name: String,
    /// Character offset into the concatenated run text of the paragraph.
    pub start_index: usize,
    /// Length of the whole marker, in characters.
    pub length: usize,
    pub format: Option<String>,
    pub is_expression: bool,
}

/// One branch of a conditional block; `condition` is `None` for the else
/// branch.
#[derive(Debug, Clone)]
pub struct ConditionalBranch {
    pub condition: Option<String>,
    pub content: Vec<SyntaxNode>,
    pub marker: SyntaxNode,
}

#[derive(Debug, Clone)]
pub struct ConditionalBlock {
    /// Non-empty; the first branch always carries a condition.
    pub branches: Vec<ConditionalBranch>,
    pub end_marker: SyntaxNode,
    pub is_table_row: bool,
    pub nesting_level: usize,
}

impl ConditionalBlock {
    /// Whether the whole block lives inside a single paragraph's text.
    pub fn is_inline(&self) -> bool {
        self.branches[0].marker == self.end_marker
    }
}

#[derive(Debug, Clone)]
pub struct LoopBlock {
    pub collection_name: String,
    pub iteration_var: Option<String>,
    pub content: Vec<SyntaxNode>,
    pub start_marker: SyntaxNode,
    pub end_marker: SyntaxNode,
    pub is_table_row: bool,
}

impl LoopBlock {
    /// Whether the whole block lives inside a single paragraph's text.
    pub fn is_inline(&self) -> bool {
        self.start_marker == self.end_marker
    }
}

/// A control marker occurrence inside one text, with character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Marker {
    pub kind: MarkerKind,
    pub start: usize,
    pub len: usize,
}

impl Marker {
    pub(crate) fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    IfStart(String),
    ElseIf(String),
    Else,
    IfEnd,
    ForeachStart {
        collection: String,
        var: Option<String>,
    },
    ForeachEnd,
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut i = at;
    for p in pattern.chars() {
        if chars.get(i) != Some(&p) {
            return false;
        }
        i += 1;
    }
    true
}

/// The offset of the next `}}`, searching from `from`.
fn find_close(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '}' && chars[i + 1] == '}' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn slice_string(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

/// Scan one text for control markers, in order.
pub(crate) fn scan_markers(chars: &[char]) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut i = 0;
    while i + 1 < chars.len() {
        if !(chars[i] == '{' && chars[i + 1] == '{') {
            i += 1;
            continue;
        }
        if starts_with(chars, i, "{{/if}}") {
            markers.push(Marker {
                kind: MarkerKind::IfEnd,
                start: i,
                len: 7,
            });
            i += 7;
        } else if starts_with(chars, i, "{{/foreach}}") {
            markers.push(Marker {
                kind: MarkerKind::ForeachEnd,
                start: i,
                len: 12,
            });
            i += 12;
        } else if starts_with(chars, i, "{{else}}") {
            markers.push(Marker {
                kind: MarkerKind::Else,
                start: i,
                len: 8,
            });
            i += 8;
        } else if starts_with(chars, i, "{{#if")
            && chars.get(i + 5).is_some_and(|c| c.is_whitespace())
        {
            match find_close(chars, i + 5) {
                Some(close) => {
                    let condition = slice_string(chars, i + 5, close).trim().to_owned();
                    markers.push(Marker {
                        kind: MarkerKind::IfStart(condition),
                        start: i,
                        len: close + 2 - i,
                    });
                    i = close + 2;
                }
                None => i += 1,
            }
        } else if starts_with(chars, i, "{{#elseif")
            && chars.get(i + 9).is_some_and(|c| c.is_whitespace())
        {
            match find_close(chars, i + 9) {
                Some(close) => {
                    let condition = slice_string(chars, i + 9, close).trim().to_owned();
                    markers.push(Marker {
                        kind: MarkerKind::ElseIf(condition),
                        start: i,
                        len: close + 2 - i,
                    });
                    i = close + 2;
                }
                None => i += 1,
            }
        } else if starts_with(chars, i, "{{#foreach")
            && chars.get(i + 10).is_some_and(|c| c.is_whitespace())
        {
            match find_close(chars, i + 10) {
                Some(close) => {
                    let inner = slice_string(chars, i + 10, close);
                    let words: Vec<&str> = inner.split_whitespace().collect();
                    let parsed = match words.as_slice() {
                        [collection] => Some((collection.to_string(), None)),
                        [collection, "as", var] => {
                            Some((collection.to_string(), Some(var.to_string())))
                        }
                        _ => None,
                    };
                    match parsed {
                        Some((collection, var)) => {
                            markers.push(Marker {
                                kind: MarkerKind::ForeachStart { collection, var },
                                start: i,
                                len: close + 2 - i,
                            });
                            i = close + 2;
                        }
                        None => i += 1,
                    }
                }
                None => i += 1,
            }
        } else {
            i += 1;
        }
    }
    markers
}

fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '@' || c == '.' => {}
        _ => return false,
    }
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '@'))
}

/// Find all placeholders in a text, in ascending `start_index` order.
/// Control markers are not placeholders and are skipped whole.
pub fn find_placeholders(text: &str) -> Vec<PlaceholderMatch> {
    let chars: Vec<char> = text.chars().collect();
    let mut matches = Vec::new();
    let mut i = 0;
    while i + 1 < chars.len() {
        if !(chars[i] == '{' && chars[i + 1] == '{') {
            i += 1;
            continue;
        }
        if starts_with(chars.as_slice(), i, "{{#")
            || starts_with(chars.as_slice(), i, "{{/")
            || starts_with(chars.as_slice(), i, "{{else}}")
        {
            i = match find_close(&chars, i + 2) {
                Some(close) => close + 2,
                None => i + 2,
            };
            continue;
        }
        let Some(close) = find_close(&chars, i + 2) else {
            break;
        };
        let inner = slice_string(&chars, i + 2, close);
        if chars.get(i + 2) == Some(&'(') {
            // expression placeholder: {{( expr )}} or {{( expr ):fmt}}
            if let Some(rp) = inner.rfind(')') {
                let expression = inner[1..rp].trim().to_owned();
                let rest = &inner[rp + 1..];
                let format = match rest.strip_prefix(':') {
                    Some(f) if !f.is_empty() => Some(f.to_owned()),
                    Some(_) => None,
                    None if rest.is_empty() => None,
                    None => {
                        i += 2;
                        continue;
                    }
                };
                if !expression.is_empty() {
                    matches.push(PlaceholderMatch {
                        variable_name: expression,
                        start_index: i,
                        length: close + 2 - i,
                        format,
                        is_expression: true,
                    });
                    i = close + 2;
                    continue;
                }
            }
            i += 2;
            continue;
        }
        let (name, format) = match inner.split_once(':') {
            Some((name, format)) => (
                name.to_owned(),
                if format.is_empty() {
                    None
                } else {
                    Some(format.to_owned())
                },
            ),
            None => (inner, None),
        };
        if is_name(&name) {
            matches.push(PlaceholderMatch {
                variable_name: name,
                start_index: i,
                length: close + 2 - i,
                format,
                is_expression: false,
            });
            i = close + 2;
        } else {
            i += 2;
        }
    }
    matches
}

/// The fixed list of control tokens that make a paragraph a marker
/// paragraph, excluded from placeholder substitution.
pub(crate) fn is_marker_paragraph_text(text: &str) -> bool {
    ["{{#if", "{{else}}", "{{/if}}", "{{#elseif", "{{#foreach", "{{/foreach}}"]
        .iter()
        .any(|token| text.contains(token))
}

/// The text a node contributes to block detection.
pub(crate) fn node_detection_text(node: &SyntaxNode) -> String {
    match node.kind() {
        PARAGRAPH => Paragraph::cast(node.clone())
            .map(|p| p.inner_text())
            .unwrap_or_default(),
        TABLE_ROW => TableRow::cast(node.clone())
            .map(|r| r.inner_text())
            .unwrap_or_default(),
        TABLE => Table::cast(node.clone())
            .map(|t| t.rows().map(|r| r.inner_text()).collect())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

struct BuildingConditional {
    branches: Vec<ConditionalBranch>,
    seen_else: bool,
}

/// Detect every conditional block in (and recursively below) a node
/// list. The result is flat; nested blocks carry a higher nesting level
/// and consumers order deepest-first.
pub(crate) fn detect_conditionals(
    nodes: &[SyntaxNode],
    is_table_row: bool,
) -> Result<Vec<ConditionalBlock>, TemplateError> {
    let mut out = Vec::new();
    detect_conditionals_into(nodes, is_table_row, 0, &mut out)?;
    Ok(out)
}

fn detect_conditionals_into(
    nodes: &[SyntaxNode],
    is_table_row: bool,
    level: usize,
    out: &mut Vec<ConditionalBlock>,
) -> Result<(), TemplateError> {
    let blocks = detect_top_conditionals(nodes, is_table_row, level)?;
    for block in blocks {
        if !block.is_inline() {
            for branch in &block.branches {
                detect_conditionals_into(&branch.content, is_table_row, level + 1, out)?;
            }
        }
        out.push(block);
    }
    Ok(())
}

fn detect_top_conditionals(
    nodes: &[SyntaxNode],
    is_table_row: bool,
    level: usize,
) -> Result<Vec<ConditionalBlock>, TemplateError> {
    let mut out: Vec<ConditionalBlock> = Vec::new();
    let mut if_depth = 0usize;
    let mut loop_depth = 0usize;
    let mut building: Option<BuildingConditional> = None;

    for node in nodes {
        let text = node_detection_text(node);
        let chars: Vec<char> = text.chars().collect();
        let mut is_marker_node = false;

        for marker in scan_markers(&chars) {
            match &marker.kind {
                MarkerKind::ForeachStart { .. } => loop_depth += 1,
                MarkerKind::ForeachEnd => loop_depth = loop_depth.saturating_sub(1),
                MarkerKind::IfStart(condition) if loop_depth == 0 => {
                    if_depth += 1;
                    if if_depth == 1 {
                        building = Some(BuildingConditional {
                            branches: vec![ConditionalBranch {
                                condition: Some(condition.clone()),
                                content: Vec::new(),
                                marker: node.clone(),
                            }],
                            seen_else: false,
                        });
                        is_marker_node = true;
                    }
                }
                MarkerKind::IfEnd if loop_depth == 0 => {
                    if if_depth == 0 {
                        return Err(TemplateError::Syntax(
                            "{{/if}} without matching {{#if}}".to_owned(),
                        ));
                    }
                    if_depth -= 1;
                    if if_depth == 0 {
                        is_marker_node = true;
                        if let Some(b) = building.take() {
                            let block = ConditionalBlock {
                                branches: b.branches,
                                end_marker: node.clone(),
                                is_table_row,
                                nesting_level: level,
                            };
                            if keep_block(&block.branches[0].marker, &block.end_marker, node) {
                                let duplicate_inline = block.is_inline()
                                    && out.last().is_some_and(|prev| {
                                        prev.is_inline() && prev.end_marker == block.end_marker
                                    });
                                if !duplicate_inline {
                                    out.push(block);
                                }
                            }
                        }
                    }
                }
                MarkerKind::ElseIf(condition) if loop_depth == 0 && if_depth == 1 => {
                    if let Some(b) = building.as_mut() {
                        if b.seen_else {
                            return Err(TemplateError::Syntax(
                                "{{#elseif}} after {{else}}".to_owned(),
                            ));
                        }
                        b.branches.push(ConditionalBranch {
                            condition: Some(condition.clone()),
                            content: Vec::new(),
                            marker: node.clone(),
                        });
                        is_marker_node = true;
                    }
                }
                MarkerKind::Else if loop_depth == 0 && if_depth == 1 => {
                    if let Some(b) = building.as_mut() {
                        if b.seen_else {
                            return Err(TemplateError::Syntax("duplicate {{else}}".to_owned()));
                        }
                        b.seen_else = true;
                        b.branches.push(ConditionalBranch {
                            condition: None,
                            content: Vec::new(),
                            marker: node.clone(),
                        });
                        is_marker_node = true;
                    }
                }
                _ => {}
            }
        }

        if !is_marker_node && if_depth >= 1 {
            if let Some(b) = building.as_mut() {
                if let Some(branch) = b.branches.last_mut() {
                    branch.content.push(node.clone());
                }
            }
        }
    }

    if if_depth != 0 {
        return Err(TemplateError::Syntax(
            "{{#if}} without matching {{/if}}".to_owned(),
        ));
    }
    Ok(out)
}

/// Whether a freshly closed block should be surfaced at this list level.
/// Blocks fully contained in one node are only meaningful for paragraphs:
/// a table or table row balancing its own markers is handled when its
/// rows or cells are walked.
fn keep_block(start: &SyntaxNode, end: &SyntaxNode, node: &SyntaxNode) -> bool {
    if start != end {
        return true;
    }
    node.kind() == PARAGRAPH
}

struct BuildingLoop {
    collection: String,
    var: Option<String>,
    start: SyntaxNode,
    content: Vec<SyntaxNode>,
}

/// Detect the loop blocks at the top level of a node list, in document
/// order. Nested loops are expanded later, when the loop visitor walks
/// its cloned content.
pub(crate) fn detect_loops(
    nodes: &[SyntaxNode],
    is_table_row: bool,
) -> Result<Vec<LoopBlock>, TemplateError> {
    let mut out: Vec<LoopBlock> = Vec::new();
    let mut depth = 0usize;
    let mut building: Option<BuildingLoop> = None;

    for node in nodes {
        let text = node_detection_text(node);
        let chars: Vec<char> = text.chars().collect();
        let mut is_marker_node = false;

        for marker in scan_markers(&chars) {
            match &marker.kind {
                MarkerKind::ForeachStart { collection, var } => {
                    depth += 1;
                    if depth == 1 {
                        building = Some(BuildingLoop {
                            collection: collection.clone(),
                            var: var.clone(),
                            start: node.clone(),
                            content: Vec::new(),
                        });
                        is_marker_node = true;
                    }
                }
                MarkerKind::ForeachEnd => {
                    if depth == 0 {
                        return Err(TemplateError::Syntax(
                            "{{/foreach}} without matching {{#foreach}}".to_owned(),
                        ));
                    }
                    depth -= 1;
                    if depth == 0 {
                        is_marker_node = true;
                        if let Some(b) = building.take() {
                            let block = LoopBlock {
                                collection_name: b.collection,
                                iteration_var: b.var,
                                content: b.content,
                                start_marker: b.start,
                                end_marker: node.clone(),
                                is_table_row,
                            };
                            if keep_block(&block.start_marker, &block.end_marker, node) {
                                let duplicate_inline = block.is_inline()
                                    && out.last().is_some_and(|prev| {
                                        prev.is_inline() && prev.end_marker == block.end_marker
                                    });
                                if !duplicate_inline {
                                    out.push(block);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if !is_marker_node && depth >= 1 {
            if let Some(b) = building.as_mut() {
                b.content.push(node.clone());
            }
        }
    }

    if depth != 0 {
        return Err(TemplateError::Syntax(
            "{{#foreach}} without matching {{/foreach}}".to_owned(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use rowan::ast::AstNode;

    fn body_nodes(doc: &Document) -> Vec<SyntaxNode> {
        doc.body().unwrap().block_elements()
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

    #[test]
    fn test_find_simple_placeholder() {
        let matches = find_placeholders("Hello {{Name}}!");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].variable_name, "Name");
        assert_eq!(matches[0].start_index, 6);
        assert_eq!(matches[0].length, 8);
        assert_eq!(matches[0].format, None);
        assert!(!matches[0].is_expression);
    }

    #[test]
    fn test_find_placeholder_with_format() {
        let matches = find_placeholders("{{Total:F2}} and {{Paid:yesno}}");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].format.as_deref(), Some("F2"));
        assert_eq!(matches[1].variable_name, "Paid");
        assert_eq!(matches[1].format.as_deref(), Some("yesno"));
    }

    #[test]
    fn test_find_path_and_metadata_placeholders() {
        let matches = find_placeholders("{{Customer.Address.City}} {{@index}} {{Items[0].Name}}");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].variable_name, "Customer.Address.City");
        assert_eq!(matches[1].variable_name, "@index");
        assert_eq!(matches[2].variable_name, "Items[0].Name");
    }

    #[test]
    fn test_find_expression_placeholder() {
        let matches = find_placeholders("{{(A and B)}} {{(X = \"a\"):checkbox}}");
        assert_eq!(matches.len(), 2);
        assert!(matches[0].is_expression);
        assert_eq!(matches[0].variable_name, "A and B");
        assert_eq!(matches[1].variable_name, "X = \"a\"");
        assert_eq!(matches[1].format.as_deref(), Some("checkbox"));
    }

    #[test]
    fn test_control_markers_are_not_placeholders() {
        let matches =
            find_placeholders("{{#if X}}{{Name}}{{else}}{{Other}}{{/if}}{{#foreach L}}{{/foreach}}");
        let names: Vec<_> = matches.iter().map(|m| m.variable_name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Other"]);
    }

    #[test]
    fn test_invalid_placeholders_skipped() {
        assert!(find_placeholders("{{}}").is_empty());
        assert!(find_placeholders("{{a b}}").is_empty());
        assert!(find_placeholders("{{unclosed").is_empty());
        assert!(find_placeholders("no markers at all").is_empty());
    }

    #[test]
    fn test_scan_markers_order_and_offsets() {
        let chars: Vec<char> = "{{#if X = \"a\"}}A{{else}}B{{/if}}".chars().collect();
        let markers = scan_markers(&chars);
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].kind, MarkerKind::IfStart("X = \"a\"".to_owned()));
        assert_eq!(markers[0].start, 0);
        assert_eq!(markers[0].len, 15);
        assert_eq!(markers[1].kind, MarkerKind::Else);
        assert_eq!(markers[2].kind, MarkerKind::IfEnd);
        assert_eq!(markers[2].end(), 32);
    }

    #[test]
    fn test_scan_foreach_marker() {
        let chars: Vec<char> = "{{#foreach Orders as o}}x{{/foreach}}".chars().collect();
        let markers = scan_markers(&chars);
        assert_eq!(
            markers[0].kind,
            MarkerKind::ForeachStart {
                collection: "Orders".to_owned(),
                var: Some("o".to_owned())
            }
        );
        assert_eq!(markers[1].kind, MarkerKind::ForeachEnd);
    }

    #[test]
    fn test_marker_paragraph_test() {
        assert!(is_marker_paragraph_text("{{#if X}}"));
        assert!(is_marker_paragraph_text("{{/foreach}}"));
        assert!(!is_marker_paragraph_text("{{Name}}"));
        assert!(!is_marker_paragraph_text("plain"));
    }

    #[test]
    fn test_detect_block_conditional() {
        let doc = doc_with_paragraphs(&["{{#if X}}", "yes", "{{else}}", "no", "{{/if}}"]);
        let nodes = body_nodes(&doc);
        let blocks = detect_conditionals(&nodes, false).unwrap();
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert!(!block.is_inline());
        assert_eq!(block.branches.len(), 2);
        assert_eq!(block.branches[0].condition.as_deref(), Some("X"));
        assert_eq!(block.branches[0].content.len(), 1);
        assert_eq!(block.branches[1].condition, None);
        assert_eq!(block.branches[1].content.len(), 1);
        assert_eq!(block.nesting_level, 0);
    }

    #[test]
    fn test_detect_nested_conditionals() {
        let doc = doc_with_paragraphs(&[
            "{{#if A}}",
            "{{#if B}}",
            "inner",
            "{{/if}}",
            "{{/if}}",
        ]);
        let nodes = body_nodes(&doc);
        let blocks = detect_conditionals(&nodes, false).unwrap();
        assert_eq!(blocks.len(), 2);
        let levels: Vec<_> = blocks.iter().map(|b| b.nesting_level).collect();
        assert!(levels.contains(&0));
        assert!(levels.contains(&1));
        // the outer block's branch content covers the inner markers
        let outer = blocks.iter().find(|b| b.nesting_level == 0).unwrap();
        assert_eq!(outer.branches[0].content.len(), 3);
    }

    #[test]
    fn test_detect_inline_conditional() {
        let doc = doc_with_paragraphs(&["before {{#if X}}yes{{/if}} after"]);
        let nodes = body_nodes(&doc);
        let blocks = detect_conditionals(&nodes, false).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_inline());
    }

    #[test]
    fn test_conditionals_inside_loops_are_deferred() {
        let doc = doc_with_paragraphs(&[
            "{{#foreach Items}}",
            "{{#if X}}",
            "body",
            "{{/if}}",
            "{{/foreach}}",
        ]);
        let nodes = body_nodes(&doc);
        let blocks = detect_conditionals(&nodes, false).unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_elseif_after_else_is_error() {
        let doc = doc_with_paragraphs(&[
            "{{#if A}}",
            "{{else}}",
            "{{#elseif B}}",
            "{{/if}}",
        ]);
        let nodes = body_nodes(&doc);
        assert!(detect_conditionals(&nodes, false).is_err());
    }

    #[test]
    fn test_unbalanced_if_is_error() {
        let doc = doc_with_paragraphs(&["{{#if A}}", "body"]);
        assert!(detect_conditionals(&body_nodes(&doc), false).is_err());
        let doc = doc_with_paragraphs(&["body", "{{/if}}"]);
        assert!(detect_conditionals(&body_nodes(&doc), false).is_err());
    }

    #[test]
    fn test_detect_loop_block() {
        let doc = doc_with_paragraphs(&["{{#foreach Orders as o}}", "{{o.Id}}", "{{/foreach}}"]);
        let nodes = body_nodes(&doc);
        let loops = detect_loops(&nodes, false).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].collection_name, "Orders");
        assert_eq!(loops[0].iteration_var.as_deref(), Some("o"));
        assert_eq!(loops[0].content.len(), 1);
        assert!(!loops[0].is_inline());
    }

    #[test]
    fn test_nested_loops_only_outermost_detected() {
        let doc = doc_with_paragraphs(&[
            "{{#foreach Orders as o}}",
            "{{#foreach o.Items as i}}",
            "{{i.Name}}",
            "{{/foreach}}",
            "{{/foreach}}",
        ]);
        let nodes = body_nodes(&doc);
        let loops = detect_loops(&nodes, false).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].collection_name, "Orders");
        assert_eq!(loops[0].content.len(), 3);
    }

    #[test]
    fn test_detect_inline_loop() {
        let doc = doc_with_paragraphs(&["{{#foreach Tags}}{{.}}{{/foreach}}"]);
        let loops = detect_loops(&body_nodes(&doc), false).unwrap();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].is_inline());
    }

    #[test]
    fn test_unbalanced_foreach_is_error() {
        let doc = doc_with_paragraphs(&["{{#foreach Orders}}", "x"]);
        assert!(detect_loops(&body_nodes(&doc), false).is_err());
    }

    #[test]
    fn test_table_balancing_markers_not_a_body_block() {
        let input = concat!(
            "<w:document><w:body><w:tbl>",
            "<w:tr><w:tc><w:p><w:r><w:t>{{#if X}}</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>body</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>{{/if}}</w:t></w:r></w:p></w:tc></w:tr>",
            "</w:tbl></w:body></w:document>"
        );
        let doc: Document = input.parse().unwrap();
        let blocks = detect_conditionals(&body_nodes(&doc), false).unwrap();
        assert!(blocks.is_empty());
        // at row level the same markers form a table-row block
        let table = doc.body().unwrap().tables().next().unwrap();
        let rows: Vec<SyntaxNode> =
            table.rows().map(|r| r.syntax().clone()).collect();
        let blocks = detect_conditionals(&rows, true).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_table_row);
        assert_eq!(blocks[0].branches[0].content.len(), 1);
    }
}
