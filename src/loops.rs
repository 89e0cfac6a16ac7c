//! The loop visitor: clone-per-iteration expansion with scoped contexts,
//! table-row loops, and inline (in-paragraph) loops.

use crate::conditional;
use crate::context::{EvaluationContext, LoopContext, LoopScope};
use crate::detect::{scan_markers, LoopBlock, MarkerKind};
use crate::document::{clone_node, detach, insert_after, Paragraph, SyntaxNode};
use crate::placeholder;
use crate::process::{TemplateError, WarningKind};
use crate::style::{rebuild_paragraph, TextBuf};
use crate::value::Value;
use crate::walker::{Walk, WalkMode};
use std::ops::Range;

enum Resolved {
    Items(Vec<Value>),
    Removed,
}

/// Resolve a loop's collection. Missing and null collections warn and
/// remove the block; anything that is not a list is a hard error, a
/// string included.
fn resolve_collection(
    walk: &mut Walk,
    name: &str,
    context: &dyn EvaluationContext,
) -> Result<Resolved, TemplateError> {
    match context.try_resolve(name) {
        None => {
            walk.warn(
                WarningKind::MissingLoopCollection,
                name,
                "foreach",
                format!("loop collection '{}' was not found", name),
            );
            Ok(Resolved::Removed)
        }
        Some(Value::Null) => {
            walk.warn(
                WarningKind::NullLoopCollection,
                name,
                "foreach",
                format!("loop collection '{}' is null", name),
            );
            Ok(Resolved::Removed)
        }
        Some(Value::List(items)) => Ok(Resolved::Items(items)),
        Some(_) => Err(TemplateError::NonIterable(name.to_owned())),
    }
}

fn remove_block(block: &LoopBlock) {
    detach(&block.start_marker);
    for node in &block.content {
        detach(node);
    }
    detach(&block.end_marker);
}

/// Expand a block loop. Iterations are materialised in reverse order and
/// spliced directly after the end marker, so the finished document reads
/// forward; each clone set is walked recursively under its iteration
/// scope before the next iteration is spliced.
pub(crate) fn apply_block(
    walk: &mut Walk,
    block: &LoopBlock,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let items = match resolve_collection(walk, &block.collection_name, context)? {
        Resolved::Items(items) => items,
        Resolved::Removed => {
            remove_block(block);
            return Ok(());
        }
    };
    if items.is_empty() {
        remove_block(block);
        return Ok(());
    }

    let count = items.len();
    for (index, item) in items.iter().enumerate().rev() {
        let clones: Vec<SyntaxNode> = block.content.iter().map(clone_node).collect();
        insert_after(&block.end_marker, clones.clone());
        let scope = LoopScope {
            item: item.clone(),
            index,
            count,
            collection_name: block.collection_name.clone(),
            iteration_var: block.iteration_var.clone(),
        };
        let loop_context = LoopContext::new(&scope, context);
        walk.walk_nodes(&clones, &loop_context, WalkMode::Cloned)?;
    }

    remove_block(block);
    Ok(())
}

/// Expand every loop that lives inside a single paragraph's text, then
/// rebuild the paragraph.
pub(crate) fn apply_inline(
    walk: &mut Walk,
    paragraph: &Paragraph,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let (mut buf, runs) = TextBuf::from_paragraph(paragraph);
    process_spans(walk, &mut buf, context)?;
    rebuild_paragraph(paragraph, &buf, &runs);
    Ok(())
}

struct LoopSpan {
    full: Range<usize>,
    body: Range<usize>,
    collection: String,
    var: Option<String>,
}

/// Top-level complete foreach spans in a text; nested loops expand
/// during the per-iteration recursion.
fn find_spans(chars: &[char]) -> Vec<LoopSpan> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut building: Option<LoopSpan> = None;

    for marker in scan_markers(chars) {
        match &marker.kind {
            MarkerKind::ForeachStart { collection, var } => {
                depth += 1;
                if depth == 1 {
                    building = Some(LoopSpan {
                        full: marker.start..marker.end(),
                        body: marker.end()..marker.end(),
                        collection: collection.clone(),
                        var: var.clone(),
                    });
                }
            }
            MarkerKind::ForeachEnd if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(mut span) = building.take() {
                        span.body.end = marker.start;
                        span.full.end = marker.end();
                        spans.push(span);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// Expand the loop spans of a text buffer, right-to-left. Each
/// iteration's fragment goes through the same phases as a node walk:
/// conditionals, nested loops, then placeholders, all under the
/// iteration scope.
pub(crate) fn process_spans(
    walk: &mut Walk,
    buf: &mut TextBuf,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let spans = find_spans(&buf.chars);
    for span in spans.into_iter().rev() {
        let items = match resolve_collection(walk, &span.collection, context)? {
            Resolved::Items(items) => items,
            Resolved::Removed => {
                buf.splice_buf(span.full, &TextBuf::new());
                continue;
            }
        };

        let body = buf.slice(span.body.clone());
        let mut expanded = TextBuf::new();
        let count = items.len();
        for (index, item) in items.iter().enumerate() {
            let mut fragment = body.clone();
            let scope = LoopScope {
                item: item.clone(),
                index,
                count,
                collection_name: span.collection.clone(),
                iteration_var: span.var.clone(),
            };
            let loop_context = LoopContext::new(&scope, context);
            conditional::process_spans(walk, &mut fragment, &loop_context)?;
            process_spans(walk, &mut fragment, &loop_context)?;
            placeholder::substitute_in_buf(walk, &mut fragment, &loop_context)?;
            expanded.extend(&fragment);
        }
        buf.splice_buf(span.full, &expanded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_spans_top_level_only() {
        let chars: Vec<char> = "a{{#foreach X}}b{{#foreach Y}}c{{/foreach}}d{{/foreach}}e"
            .chars()
            .collect();
        let spans = find_spans(&chars);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].collection, "X");
        let body: String = chars[spans[0].body.clone()].iter().collect();
        assert_eq!(body, "b{{#foreach Y}}c{{/foreach}}d");
    }

    #[test]
    fn test_find_spans_with_var() {
        let chars: Vec<char> = "{{#foreach Orders as o}}x{{/foreach}}".chars().collect();
        let spans = find_spans(&chars);
        assert_eq!(spans[0].var.as_deref(), Some("o"));
    }

    #[test]
    fn test_find_spans_sequential() {
        let chars: Vec<char> = "{{#foreach A}}1{{/foreach}}{{#foreach B}}2{{/foreach}}"
            .chars()
            .collect();
        let spans = find_spans(&chars);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].collection, "A");
        assert_eq!(spans[1].collection, "B");
    }

    #[test]
    fn test_find_spans_ignores_unmatched() {
        let chars: Vec<char> = "{{/foreach}}{{#foreach A}}".chars().collect();
        assert!(find_spans(&chars).is_empty());
    }
}
