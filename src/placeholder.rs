//! The placeholder visitor: per-run replacement when a marker sits
//! inside a single run, a formatting-preserving merge when it spans
//! several, and run/break/markdown emission for rich replacement values.

use crate::context::EvaluationContext;
use crate::detect::{find_placeholders, PlaceholderMatch};
use crate::document::{
    break_run, detach, insert_before, run_parts, Paragraph, Run, SyntaxNode,
};
use crate::expr;
use crate::process::{MissingVariableBehavior, TemplateError, WarningKind};
use crate::style::{contains_markdown, first_properties_clone, merge_markdown, parse_markdown, TextBuf};
use crate::value::Value;
use crate::walker::Walk;
use rowan::ast::AstNode;

/// Substitute every placeholder in a paragraph, in descending
/// `start_index` order so earlier replacements do not invalidate later
/// offsets.
pub(crate) fn apply_paragraph(
    walk: &mut Walk,
    paragraph: &Paragraph,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let text = paragraph.inner_text();
    let matches = find_placeholders(&text);
    for m in matches.iter().rev() {
        let Some(value) = resolve_replacement(walk, m, context, &text)? else {
            continue;
        };
        substitute(walk, paragraph, m, &value)?;
    }
    Ok(())
}

/// Substitute every placeholder of a text buffer during in-paragraph
/// surgery; the replacement inherits the formatting origin of the marker
/// it replaces.
pub(crate) fn substitute_in_buf(
    walk: &mut Walk,
    buf: &mut TextBuf,
    context: &dyn EvaluationContext,
) -> Result<(), TemplateError> {
    let text = buf.text();
    let matches = find_placeholders(&text);
    for m in matches.iter().rev() {
        let Some(value) = resolve_replacement(walk, m, context, &text)? else {
            continue;
        };
        walk.count_replacement();
        buf.splice_str(m.start_index..m.start_index + m.length, &value);
    }
    Ok(())
}

/// Resolve a placeholder to its replacement string, or `None` when the
/// marker stays in place. A hard error is only possible under
/// `ThrowException`.
fn resolve_replacement(
    walk: &mut Walk,
    m: &PlaceholderMatch,
    context: &dyn EvaluationContext,
    surrounding: &str,
) -> Result<Option<String>, TemplateError> {
    let mut expression_failed = false;
    let resolved = if m.is_expression {
        match expr::evaluate(&m.variable_name, context) {
            Ok(value) => Some(Value::Bool(value)),
            Err(err) => {
                walk.warn(
                    WarningKind::ExpressionFailed,
                    &m.variable_name,
                    &excerpt(surrounding),
                    err.to_string(),
                );
                expression_failed = true;
                None
            }
        }
    } else {
        context.try_resolve(&m.variable_name)
    };

    match resolved {
        Some(value) => Ok(Some(format_value(walk, &value, m.format.as_deref()))),
        None => {
            if !expression_failed {
                walk.record_missing(&m.variable_name, &excerpt(surrounding));
            }
            match walk.options.missing_variable_behavior {
                MissingVariableBehavior::LeaveUnchanged => Ok(None),
                MissingVariableBehavior::ReplaceWithEmpty => Ok(Some(String::new())),
                MissingVariableBehavior::ThrowException => {
                    Err(TemplateError::MissingVariable(m.variable_name.clone()))
                }
            }
        }
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 60 {
        trimmed.to_owned()
    } else {
        let cut: String = trimmed.chars().take(60).collect();
        format!("{}…", cut)
    }
}

/// Render a value with the configured culture; booleans go through the
/// formatter registry when they carry a known specifier.
pub(crate) fn format_value(walk: &Walk, value: &Value, format: Option<&str>) -> String {
    if let Value::Bool(b) = value {
        if let Some(format) = format {
            if let Some(text) = walk.options.boolean_formatters.format(format, *b) {
                return text;
            }
        }
        return if *b { "True" } else { "False" }.to_owned();
    }
    value.display(&walk.options.culture, format)
}

fn split_newlines(value: &str) -> Vec<String> {
    value
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Replace one placeholder span in a paragraph.
fn substitute(
    walk: &mut Walk,
    paragraph: &Paragraph,
    m: &PlaceholderMatch,
    value: &str,
) -> Result<(), TemplateError> {
    let boundaries = paragraph.run_boundaries();
    let start = m.start_index;
    let end = m.start_index + m.length;
    let spanned: Vec<&(usize, usize, Run)> = boundaries
        .iter()
        .filter(|(run_start, run_end, _)| *run_start < end && *run_end > start)
        .collect();
    let (Some((first_start, _, first_run)), Some((last_start, _, last_run))) =
        (spanned.first().copied(), spanned.last().copied())
    else {
        return Ok(());
    };
    walk.count_replacement();

    let prefix: String = first_run
        .inner_text()
        .chars()
        .take(start - first_start)
        .collect();
    let suffix: String = last_run
        .inner_text()
        .chars()
        .skip(end - last_start)
        .collect();

    let needs_newlines = walk.options.enable_newline_support
        && (value.contains('\n') || value.contains('\r'));
    let needs_markdown = contains_markdown(value);

    if !needs_newlines && !needs_markdown {
        let combined = format!("{}{}{}", prefix, value, suffix);
        if spanned.len() == 1 {
            first_run.set_inner_text(&combined);
        } else {
            let props = first_properties_clone(spanned.iter().map(|entry| &entry.2));
            let replacement = Run::build(props.as_ref(), &run_parts(&combined));
            insert_before(first_run.syntax(), vec![replacement]);
            for (_, _, run) in &spanned {
                detach(run.syntax());
            }
        }
        return Ok(());
    }

    // rich replacement: line breaks and markdown become run sequences
    let props = if spanned.len() == 1 {
        first_run.properties().map(|p| p.detached_clone())
    } else {
        first_properties_clone(spanned.iter().map(|entry| &entry.2))
    };
    let lines = if needs_newlines {
        split_newlines(value)
    } else {
        vec![value.to_owned()]
    };
    let last_index = lines.len() - 1;
    let mut nodes: Vec<SyntaxNode> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            nodes.push(break_run(props.as_ref()));
        }
        let lead = if index == 0 { prefix.as_str() } else { "" };
        let tail = if index == last_index { suffix.as_str() } else { "" };
        if contains_markdown(line) {
            if !lead.is_empty() {
                nodes.push(Run::build(props.as_ref(), &run_parts(lead)));
            }
            for segment in parse_markdown(line) {
                let segment_props =
                    merge_markdown(props.as_ref(), segment.bold, segment.italic, segment.strike);
                nodes.push(Run::build(segment_props.as_ref(), &run_parts(&segment.text)));
            }
            if !tail.is_empty() {
                nodes.push(Run::build(props.as_ref(), &run_parts(tail)));
            }
        } else {
            let combined = format!("{}{}{}", lead, line, tail);
            nodes.push(Run::build(props.as_ref(), &run_parts(&combined)));
        }
    }
    insert_before(first_run.syntax(), nodes);
    for (_, _, run) in &spanned {
        detach(run.syntax());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::document::Document;
    use crate::process::{ProcessOptions, TemplateProcessor};

    fn doc_of(body: &str) -> Document {
        format!("<w:document><w:body>{}</w:body></w:document>", body)
            .parse()
            .unwrap()
    }

    fn process(doc: &Document, json: &str) {
        let result = TemplateProcessor::default().process_json(doc, json).unwrap();
        assert!(result.is_success, "{:?}", result.error_message);
    }

    fn first_paragraph(doc: &Document) -> crate::document::Paragraph {
        doc.body().unwrap().paragraphs().next().unwrap()
    }

    #[test]
    fn test_single_run_keeps_all_properties() {
        let doc = doc_of(concat!(
            "<w:p><w:r>",
            "<w:rPr><w:b/><w:i/><w:u w:val=\"single\"/><w:color w:val=\"FF0000\"/>",
            "<w:highlight w:val=\"yellow\"/><w:sz w:val=\"28\"/></w:rPr>",
            "<w:t>Hello {{Name}}!</w:t></w:r></w:p>"
        ));
        process(&doc, r#"{ "Name": "Ada" }"#);
        let paragraph = first_paragraph(&doc);
        assert_eq!(paragraph.inner_text(), "Hello Ada!");
        let runs: Vec<_> = paragraph.runs().collect();
        assert_eq!(runs.len(), 1);
        let props = runs[0].properties().unwrap();
        assert!(props.bold());
        assert!(props.italic());
        assert_eq!(props.underline().as_deref(), Some("single"));
        assert_eq!(props.color().as_deref(), Some("FF0000"));
        assert_eq!(props.highlight().as_deref(), Some("yellow"));
        assert_eq!(props.size().as_deref(), Some("28"));
    }

    #[test]
    fn test_split_placeholder_merges_to_single_run() {
        // {{Nam | e | }} across three bold runs
        let doc = doc_of(concat!(
            "<w:p>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>{{Nam</w:t></w:r>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>e</w:t></w:r>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>}}</w:t></w:r>",
            "</w:p>"
        ));
        process(&doc, r#"{ "Name": "X" }"#);
        let paragraph = first_paragraph(&doc);
        assert_eq!(paragraph.inner_text(), "X");
        let runs: Vec<_> = paragraph.runs().collect();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].properties().unwrap().bold());
    }

    #[test]
    fn test_split_placeholder_keeps_neighbours() {
        let doc = doc_of(concat!(
            "<w:p>",
            "<w:r><w:t>before </w:t></w:r>",
            "<w:r><w:rPr><w:i/></w:rPr><w:t>x{{Na</w:t></w:r>",
            "<w:r><w:t>me}}y</w:t></w:r>",
            "<w:r><w:t> after</w:t></w:r>",
            "</w:p>"
        ));
        process(&doc, r#"{ "Name": "A" }"#);
        let paragraph = first_paragraph(&doc);
        assert_eq!(paragraph.inner_text(), "before xAy after");
        let runs: Vec<_> = paragraph.runs().collect();
        assert_eq!(runs.len(), 3);
        // the merged run carries the first spanned run's italics
        assert!(runs[1].properties().unwrap().italic());
        assert!(runs[0].properties().is_none());
    }

    #[test]
    fn test_newline_value_emits_breaks() {
        let doc = doc_of("<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{{Address}}</w:t></w:r></w:p>");
        process(&doc, r#"{ "Address": "Line1\nLine2\r\nLine3" }"#);
        let paragraph = first_paragraph(&doc);
        assert_eq!(paragraph.inner_text(), "Line1Line2Line3");
        let markup = doc.to_string();
        assert_eq!(markup.matches("<w:br/>").count(), 2);
        // every emitted text run keeps the source formatting
        assert_eq!(markup.matches("<w:b/>").count(), 5);
    }

    #[test]
    fn test_newline_support_can_be_disabled() {
        let doc = doc_of("<w:p><w:r><w:t>{{Address}}</w:t></w:r></w:p>");
        let options = ProcessOptions {
            enable_newline_support: false,
            ..ProcessOptions::default()
        };
        let result = TemplateProcessor::new(options)
            .process_json(&doc, r#"{ "Address": "a\nb" }"#)
            .unwrap();
        assert!(result.is_success);
        assert!(!doc.to_string().contains("<w:br/>"));
    }

    #[test]
    fn test_markdown_value_styles_segments() {
        let doc = doc_of(concat!(
            "<w:p><w:r><w:rPr><w:sz w:val=\"28\"/></w:rPr>",
            "<w:t>{{Note}}</w:t></w:r></w:p>"
        ));
        process(&doc, r#"{ "Note": "plain **bold** and ~~gone~~" }"#);
        let paragraph = first_paragraph(&doc);
        assert_eq!(paragraph.inner_text(), "plain bold and gone");
        let runs: Vec<_> = paragraph.runs().collect();
        assert_eq!(runs.len(), 4);
        let bold_run = &runs[1];
        let props = bold_run.properties().unwrap();
        assert!(props.bold());
        // markdown styling merges on top of the base formatting
        assert_eq!(props.size().as_deref(), Some("28"));
        assert!(runs[3].properties().unwrap().strike());
        assert!(!runs[0].properties().unwrap().bold());
    }

    #[test]
    fn test_tab_in_value_becomes_tab_element() {
        let doc = doc_of("<w:p><w:r><w:t>{{X}}</w:t></w:r></w:p>");
        process(&doc, r#"{ "X": "a\tb" }"#);
        assert!(doc.to_string().contains("<w:tab/>"));
        assert_eq!(first_paragraph(&doc).inner_text(), "a\tb");
    }

    #[test]
    fn test_descending_order_multiple_placeholders() {
        let doc = doc_of("<w:p><w:r><w:t>{{A}} and {{B}} and {{C}}</w:t></w:r></w:p>");
        process(&doc, r#"{ "A": "1", "B": "22", "C": "333" }"#);
        assert_eq!(first_paragraph(&doc).inner_text(), "1 and 22 and 333");
    }
}
