//! The conditional visitor: branch selection, marker and dead-branch
//! removal, and inline (in-paragraph) conditionals.

use crate::context::EvaluationContext;
use crate::detect::{scan_markers, ConditionalBlock, MarkerKind};
use crate::document::{detach, Paragraph};
use crate::expr;
use crate::process::{TemplateError, WarningKind};
use crate::style::{rebuild_paragraph, TextBuf};
use crate::walker::Walk;
use std::ops::Range;

/// Evaluate a branch condition; an unparseable condition warns and
/// counts as false.
pub(crate) fn eval_condition(
    walk: &mut Walk,
    condition: &str,
    context: &dyn EvaluationContext,
) -> bool {
    match expr::evaluate(condition, context) {
        Ok(value) => value,
        Err(err) => {
            walk.warn(
                WarningKind::ExpressionFailed,
                condition,
                "condition",
                err.to_string(),
            );
            false
        }
    }
}

/// Resolve a block conditional: keep the selected branch's content, drop
/// everything else including all markers.
pub(crate) fn apply_block(
    walk: &mut Walk,
    block: &ConditionalBlock,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let mut selected = None;
    for (index, branch) in block.branches.iter().enumerate() {
        let truthy = match &branch.condition {
            Some(condition) => eval_condition(walk, condition, context),
            None => true,
        };
        if truthy {
            selected = Some(index);
            break;
        }
    }

    for branch in &block.branches {
        detach(&branch.marker);
    }
    detach(&block.end_marker);
    for (index, branch) in block.branches.iter().enumerate() {
        if selected != Some(index) {
            for node in &branch.content {
                detach(node);
            }
        }
    }
    Ok(())
}

/// Resolve every conditional that lives inside a single paragraph's
/// text, then rebuild the paragraph with the surviving characters'
/// original formatting.
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

struct InlineBranch {
    condition: Option<String>,
    content: Range<usize>,
}

struct InlineSpan {
    full: Range<usize>,
    branches: Vec<InlineBranch>,
}

/// Top-level complete conditional spans in a text. Markers inside
/// foreach regions belong to a later loop expansion and are skipped;
/// unmatched markers are left in place.
fn find_spans(chars: &[char]) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    let mut if_depth = 0usize;
    let mut loop_depth = 0usize;
    let mut full_start = 0;
    let mut branches: Vec<InlineBranch> = Vec::new();

    for marker in scan_markers(chars) {
        match &marker.kind {
            MarkerKind::ForeachStart { .. } => loop_depth += 1,
            MarkerKind::ForeachEnd => loop_depth = loop_depth.saturating_sub(1),
            MarkerKind::IfStart(condition) if loop_depth == 0 => {
                if_depth += 1;
                if if_depth == 1 {
                    full_start = marker.start;
                    branches = vec![InlineBranch {
                        condition: Some(condition.clone()),
                        content: marker.end()..marker.end(),
                    }];
                }
            }
            MarkerKind::ElseIf(condition) if loop_depth == 0 && if_depth == 1 => {
                if let Some(last) = branches.last_mut() {
                    last.content.end = marker.start;
                }
                branches.push(InlineBranch {
                    condition: Some(condition.clone()),
                    content: marker.end()..marker.end(),
                });
            }
            MarkerKind::Else if loop_depth == 0 && if_depth == 1 => {
                if let Some(last) = branches.last_mut() {
                    last.content.end = marker.start;
                }
                branches.push(InlineBranch {
                    condition: None,
                    content: marker.end()..marker.end(),
                });
            }
            MarkerKind::IfEnd if loop_depth == 0 && if_depth > 0 => {
                if_depth -= 1;
                if if_depth == 0 {
                    if let Some(last) = branches.last_mut() {
                        last.content.end = marker.start;
                    }
                    spans.push(InlineSpan {
                        full: full_start..marker.end(),
                        branches: std::mem::take(&mut branches),
                    });
                }
            }
            _ => {}
        }
    }
    spans
}

/// Process the conditional spans of a text buffer, right-to-left so
/// surviving offsets stay valid. The selected branch's content is
/// processed recursively before it replaces the whole span.
pub(crate) fn process_spans(
    walk: &mut Walk,
    buf: &mut TextBuf,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let spans = find_spans(&buf.chars);
    for span in spans.into_iter().rev() {
        let mut replacement = TextBuf::new();
        for branch in &span.branches {
            let truthy = match &branch.condition {
                Some(condition) => eval_condition(walk, condition, context),
                None => true,
            };
            if truthy {
                let mut inner = buf.slice(branch.content.clone());
                process_spans(walk, &mut inner, context)?;
                replacement = inner;
                break;
            }
        }
        buf.splice_buf(span.full, &replacement);
    }
    Ok(())
}
