// tests/classifier_openai.rs
use std::sync::Arc;

use war_alert::processors::{ClassifierGate, LanguageModel, OpenAiModel, PromptTemplate};
use war_alert::{Content, Processor};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn openai_request_uses_json_mode_and_prompt_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "response_format": { "type": "json_object" },
            "messages": [{ "role": "user", "content": "Judge: Border: Troops moving" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"result":"yes","justification":"Troop movement at the border"}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let prompt = dir.path().join("prompt.txt");
    std::fs::write(&prompt, "Judge: <content>").unwrap();

    let model = OpenAiModel::new(
        Some("sk-test".into()),
        "gpt-4o-mini",
        &format!("{}/v1", server.uri()),
    )
    .unwrap();
    let gate = ClassifierGate::new(Arc::new(model), PromptTemplate::File(prompt));

    let out = gate
        .process(Content::article("Border", "Troops moving", "", "https://x"))
        .await
        .expect("forwarded");
    assert_eq!(out.description, "Troop movement at the border");
}

#[tokio::test]
async fn openai_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let model = OpenAiModel::new(Some("sk".into()), "m", &server.uri()).unwrap();
    let err = model.complete("hi").await.unwrap_err();
    assert!(format!("{err:#}").contains("429"));
}

#[tokio::test]
async fn missing_api_key_drops_without_calling_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let model = OpenAiModel::new(None, "m", &server.uri()).unwrap();
    let gate = ClassifierGate::new(Arc::new(model), PromptTemplate::Inline("<content>".into()));
    assert!(gate.process(Content::article("a", "b", "", "")).await.is_none());
}
