use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docx_template::{Document, TemplateProcessor, Value};
use std::str::FromStr;

fn template() -> String {
    let mut body = String::new();
    body.push_str("<w:p><w:r><w:t>Invoice {{Number}} for {{Customer.Name}}</w:t></w:r></w:p>");
    body.push_str("<w:p><w:r><w:t>{{#foreach Lines as l}}</w:t></w:r></w:p>");
    body.push_str("<w:p><w:r><w:t>{{@index}}: {{l.Article}} x {{l.Count}}</w:t></w:r></w:p>");
    body.push_str("<w:p><w:r><w:t>{{/foreach}}</w:t></w:r></w:p>");
    body.push_str("<w:p><w:r><w:t>{{#if Paid}}paid{{else}}due{{/if}}</w:t></w:r></w:p>");
    format!(
        "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    )
}

fn data() -> Value {
    let mut lines = String::new();
    for i in 0..50 {
        if i > 0 {
            lines.push(',');
        }
        lines.push_str(&format!(
            "{{ \"Article\": \"article-{}\", \"Count\": {} }}",
            i,
            i % 7
        ));
    }
    Value::parse_data(&format!(
        "{{ \"Number\": \"2024-001\", \"Customer\": {{ \"Name\": \"ACME\" }}, \"Paid\": true, \"Lines\": [{}] }}",
        lines
    ))
    .unwrap()
}

fn process_benchmark(c: &mut Criterion) {
    let xml = template();
    let data = data();
    let processor = TemplateProcessor::default();

    c.bench_function("parse_document", |b| {
        b.iter(|| {
            let _doc = Document::from_str(black_box(&xml)).unwrap();
        });
    });

    c.bench_function("process_template", |b| {
        b.iter(|| {
            let doc = Document::from_str(&xml).unwrap();
            let result = processor.process(&doc, black_box(&data));
            assert!(result.is_success);
            black_box(doc.to_string());
        });
    });
}

criterion_group!(benches, process_benchmark);
criterion_main!(benches);
