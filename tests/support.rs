#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    sync::Arc,
    time::Duration,
};

use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use serde_json::{Value, json};
use veritas::{
    config::Settings,
    server::{AppState, router},
};
use wiremock::MockServer;
use zip::{ZipWriter, write::SimpleFileOptions};

/// Path the mock upstream serves completions on.
pub const COMPLETIONS_PATH: &str = "/chat/completions";

/// Settings pointing at `server` with a test key and a short timeout.
pub fn settings_for(server: &MockServer) -> Settings {
    Settings::builder()
        .api_key("test-key")
        .api_url(format!("{}{COMPLETIONS_PATH}", server.uri()))
        .model("test-model")
        .timeout(Duration::from_secs(5))
        .frontend_dir("this-frontend-does-not-exist")
        .build()
}

/// A thesis excerpt long enough to be evaluated.
pub fn thesis_text() -> String {
    "Este trabalho investiga o impacto de metodologias ativas no ensino de \
     engenharia. A pesquisa adota abordagem quantitativa com questionarios \
     aplicados a 240 estudantes e analise estatistica inferencial."
        .to_string()
}

/// Evaluation reply as the model is asked to produce it.
pub fn evaluation_reply(scores: [f64; 3], final_score: f64) -> Value {
    json!({
        "evaluator_1": {
            "name": "Avaliador 1 - Metodologia",
            "analysis": "A metodologia esta bem delimitada.",
            "score": scores[0]
        },
        "evaluator_2": {
            "name": "Avaliador 2 - Escrita Academica e ABNT",
            "analysis": "Citacoes seguem a ABNT com poucas excecoes.",
            "score": scores[1]
        },
        "evaluator_3": {
            "name": "Avaliador 3 - Originalidade",
            "analysis": "Contribuicao original com baixo risco de plagio.",
            "score": scores[2]
        },
        "final_verdict": {
            "summary": "Trabalho consistente.",
            "final_score": final_score,
            "recommendations": "Ampliar a discussao dos resultados."
        }
    })
}

/// Chat-completions envelope whose first choice carries `content`.
pub fn completion(content: &str) -> Value {
    json!({
        "id": "cmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

/// Starts the HTTP service on an ephemeral port and returns its base URL.
pub async fn spawn_app(settings: Settings) -> String {
    let state = AppState::new(Arc::new(settings)).expect("state should build");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let address = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .await
            .expect("server should run");
    });
    format!("http://{address}")
}

/// Builds a minimal DOCX package around `body_xml` (the children of
/// `w:body`).
pub fn docx(body_xml: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}</w:body></w:document>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .expect("start document entry");
    writer
        .write_all(document.as_bytes())
        .expect("write document entry");
    writer.finish().expect("finish archive").into_inner()
}

/// One DOCX paragraph with a single run.
pub fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
}

/// One page of a PDF fixture.
#[derive(Clone, Copy)]
pub enum PdfPage<'a> {
    /// A page showing these lines, or nothing when empty.
    Text(&'a [&'a str]),
    /// A page whose content stream is referenced but never written.
    MissingContent,
}

/// Builds a one-page PDF whose page shows `lines`, or an empty page when
/// `lines` is empty.
pub fn pdf(lines: &[&str]) -> Vec<u8> {
    pdf_pages(&[PdfPage::Text(lines)])
}

/// Builds a PDF with one page per entry of `pages`, in order.
pub fn pdf_pages(pages: &[PdfPage<'_>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let content_id = match page {
            PdfPage::Text(lines) => {
                let content = Content { operations: text_operations(lines) };
                doc.add_object(Stream::new(
                    dictionary! {},
                    content.encode().expect("encode page content"),
                ))
            }
            PdfPage::MissingContent => doc.new_object_id(),
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

fn text_operations(lines: &[&str]) -> Vec<Operation> {
    if lines.is_empty() {
        return Vec::new();
    }
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("TL", vec![12.into()]),
        Operation::new("Td", vec![40.into(), 800.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}
