//! Upstream client and evaluator behaviour against a mocked chat-completions
//! service.

#[path = "support.rs"]
mod support;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde_json::json;
use support::{COMPLETIONS_PATH, completion, evaluation_reply, settings_for, thesis_text};
use veritas::{client::ChatClient, config::Settings, error::EvaluationError, evaluator::Evaluator};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn evaluator(settings: Settings) -> Evaluator {
    Evaluator::from_settings(Arc::new(settings)).expect("evaluator should build")
}

#[tokio::test]
async fn request_carries_credentials_model_and_both_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "test-model", "max_tokens": 4000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(Arc::new(settings_for(&server))).unwrap();
    let content = client.complete("prompt").await.unwrap();
    assert_eq!(content, "{}");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "prompt");
}

#[tokio::test]
async fn slow_upstream_times_out_after_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("{}"))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let settings = Settings::builder()
        .api_key("test-key")
        .api_url(format!("{}{COMPLETIONS_PATH}", server.uri()))
        .timeout(Duration::from_millis(200))
        .build();
    let client = ChatClient::new(Arc::new(settings)).unwrap();

    let started = Instant::now();
    let err = client.complete("prompt").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(1), "gave up after {elapsed:?}");
    match err {
        EvaluationError::Timeout { after } => assert_eq!(after, Duration::from_millis(200)),
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn non_success_status_is_an_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(Arc::new(settings_for(&server))).unwrap();
    match client.complete("prompt").await.unwrap_err() {
        EvaluationError::Upstream { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    let settings = Settings::builder()
        .api_key("test-key")
        .api_url("http://127.0.0.1:9/chat/completions")
        .build();
    let client = ChatClient::new(Arc::new(settings)).unwrap();

    let err = client.complete("prompt").await.unwrap_err();
    assert!(matches!(err, EvaluationError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn fenced_and_bare_replies_evaluate_identically() {
    let reply = evaluation_reply([2.5, 1.5, 1.5], 6.0).to_string();
    let mut results = Vec::new();

    for content in [reply.clone(), format!("```json\n{reply}\n```"), format!("```\n{reply}\n```")] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&content)))
            .expect(1)
            .mount(&server)
            .await;

        results.push(evaluator(settings_for(&server)).evaluate(&thesis_text()).await.unwrap());
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
    assert_eq!(results[0].final_verdict.final_score, 6.0);
}

#[tokio::test]
async fn evaluator_overrides_inconsistent_final_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&evaluation_reply([3.0, 2.0, 2.0], 4.0).to_string())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = evaluator(settings_for(&server))
        .evaluate(&thesis_text())
        .await
        .unwrap();

    assert_eq!(result.final_verdict.final_score, 7.0);
    assert!(result.success);
    assert_eq!(result.evaluator_2.name, "Avaliador 2 - Escrita Academica e ABNT");
}

#[tokio::test]
async fn thesis_text_is_sent_inside_the_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&evaluation_reply([1.0, 1.0, 1.0], 3.0).to_string())),
        )
        .mount(&server)
        .await;

    evaluator(settings_for(&server))
        .evaluate(&thesis_text())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains(&thesis_text()));
}

#[tokio::test]
async fn incomplete_reply_names_the_missing_evaluator() {
    let mut reply = evaluation_reply([1.0, 1.0, 1.0], 3.0);
    reply.as_object_mut().unwrap().remove("evaluator_2");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&reply.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let err = evaluator(settings_for(&server))
        .evaluate(&thesis_text())
        .await
        .unwrap_err();
    assert!(
        matches!(err, EvaluationError::Schema { ref field, .. } if field == "evaluator_2"),
        "{err:?}"
    );
}

#[tokio::test]
async fn prose_reply_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("Desculpe, nao posso avaliar.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = evaluator(settings_for(&server))
        .evaluate(&thesis_text())
        .await
        .unwrap_err();
    match err {
        EvaluationError::ResponseParse { excerpt, .. } => {
            assert_eq!(excerpt, "Desculpe, nao posso avaliar.")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
