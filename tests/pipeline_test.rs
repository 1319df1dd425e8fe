/// End-to-end pipeline tests: stub browser → sanitize → real HTTP chat client
/// against a wiremock endpoint.
use page_scout::core::config::{ExtractSettings, FetchSettings, LlmSettings};
use page_scout::core::retry::RetryPolicy;
use page_scout::llm::OpenAiChatClient;
use page_scout::testing::{StubAttempt, StubDriver};
use page_scout::{AnswerError, ExtractionError, RemoteErrorKind, Scout};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const PRODUCT_PAGE: &str = r#"<html>
<head><title>XYZ Smartwatch Pro</title><script>window.dataLayer = [];</script></head>
<body>
  <nav>Home | Shop | Cart</nav>
  <main>
    <h1>XYZ Smartwatch Pro - Advanced Fitness Tracker</h1>
    <p>Price: $299.99</p>
    <p>In Stock. Rated 4.7 out of 5 stars by 1,250 customers.</p>
    <ul><li>Heart rate monitoring</li><li>GPS tracking</li><li>5-day battery life</li></ul>
  </main>
  <footer>© 2025 XYZ Corp</footer>
</body>
</html>"#;

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

fn scout_against(server: &MockServer, driver: StubDriver) -> Scout {
    let llm = LlmSettings {
        base_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
        api_key: "sk-test".to_string(),
        model: "test-model".to_string(),
        request_timeout: Duration::from_secs(5),
    };
    let chat = OpenAiChatClient::new(&llm).unwrap();
    Scout::with_backends(
        Arc::new(driver),
        Arc::new(chat),
        llm.model,
        FetchSettings {
            timeout: Duration::from_secs(1),
            ..FetchSettings::default()
        },
        ExtractSettings {
            context_chars: 15_000,
            api_retry: RetryPolicy::exponential(3, Duration::from_millis(10)),
        },
    )
}

#[tokio::test]
async fn product_page_extraction_and_question() {
    init_logger();
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .and(matchers::body_partial_json(json!({"response_format": {"type": "json_object"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{
                "title": "XYZ Smartwatch Pro - Advanced Fitness Tracker",
                "main_content_type": "product listing",
                "product_name": "XYZ Smartwatch Pro",
                "price": "$299.99",
                "currency": "USD",
                "availability": "In Stock",
                "rating": "4.7 out of 5 stars",
                "number_of_reviews": 1250,
                "author": null,
                "key_details": ["Heart rate monitoring", "GPS tracking", "5-day battery life"]
            }"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .and(matchers::body_string_contains("Question: How much does it cost?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("It costs $299.99.\n")))
        .expect(1)
        .mount(&server)
        .await;

    let scout = scout_against(&server, StubDriver::serving(PRODUCT_PAGE));
    let session = scout.open("https://shop.example.com/xyz-pro").await.unwrap();

    let text = session.text();
    assert!(text.starts_with("XYZ Smartwatch Pro XYZ Smartwatch Pro - Advanced Fitness Tracker"));
    assert!(!text.contains("dataLayer"));
    assert!(!text.contains("Cart"));
    assert!(!text.contains("XYZ Corp"));

    let extraction = session.extract().await.unwrap();
    assert_eq!(extraction.product_name().as_deref(), Some("XYZ Smartwatch Pro"));
    assert_eq!(extraction.price().as_deref(), Some("$299.99"));
    assert_eq!(extraction.number_of_reviews(), Some(1250));
    assert_eq!(extraction.key_details().len(), 3);
    assert!(!extraction.contains("author"));

    let answer = session.answer("How much does it cost?").await.unwrap();
    assert_eq!(answer, "It costs $299.99.");
}

#[tokio::test]
async fn rate_limited_endpoint_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"title":"OK"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let scout = scout_against(&server, StubDriver::serving(PRODUCT_PAGE));
    let session = scout.open("https://shop.example.com/xyz-pro").await.unwrap();
    let extraction = session.extract().await.unwrap();
    assert_eq!(extraction.title().as_deref(), Some("OK"));
}

#[tokio::test]
async fn bad_credentials_fail_fast() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let scout = scout_against(&server, StubDriver::serving(PRODUCT_PAGE));
    let session = scout.open("https://shop.example.com/xyz-pro").await.unwrap();

    match session.answer("Is it waterproof?").await {
        Err(AnswerError::RemoteServiceError(e)) => {
            assert_eq!(e.kind, RemoteErrorKind::Authentication);
            assert!(e.message.contains("Incorrect API key"));
        }
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_model_output_surfaces_raw_text() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I cannot do that.")))
        .expect(1)
        .mount(&server)
        .await;

    let scout = scout_against(&server, StubDriver::serving(PRODUCT_PAGE));
    let session = scout.open("https://shop.example.com/xyz-pro").await.unwrap();

    match session.extract().await {
        Err(ExtractionError::MalformedExtraction { raw, .. }) => {
            assert_eq!(raw, "I cannot do that.")
        }
        other => panic!("expected malformed extraction, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_page_never_calls_the_model() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let driver = StubDriver::always(StubAttempt::NeverReady);
    let scout = scout_against(&server, driver);
    let err = scout.open("https://shop.example.com/spa").await.err().unwrap();
    assert_eq!(err.kind(), "readiness_timeout");
}
