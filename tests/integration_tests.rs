use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::stream;
use serde_json::{Value, json};
use tower::ServiceExt;

use moderelay::server::{AppState, CHAT_FAILED, INVALID_BODY, router};
use moderelay::{
    ChatCompletionCreateParams, CompletionProvider, CompletionRole, Conversation, Error,
    ErrorBody, FragmentStream, Mode, ModeSummary, OpenAi, Relay, RelaySettings, Result,
    TurnOutcome, read_turn,
};

const HI_THERE: &str =
    "data: {\"content\":\"Hi\"}\n\ndata: {\"content\":\" there.\"}\n\ndata: [DONE]\n\n";

struct MockProvider {
    fragments: Vec<Result<String>>,
    reject: Option<Error>,
    calls: AtomicUsize,
    last: Mutex<Option<ChatCompletionCreateParams>>,
}

impl MockProvider {
    fn fragments(fragments: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fragments: fragments.iter().map(|f| Ok(f.to_string())).collect(),
            reject: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    fn failing_after(fragments: &[&str], err: Error) -> Arc<Self> {
        let mut items: Vec<Result<String>> =
            fragments.iter().map(|f| Ok(f.to_string())).collect();
        items.push(Err(err));
        Arc::new(Self {
            fragments: items,
            reject: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    fn rejecting(err: Error) -> Arc<Self> {
        Arc::new(Self {
            fragments: Vec::new(),
            reject: Some(err),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MockProvider {
    async fn stream(&self, params: ChatCompletionCreateParams) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(params);
        if let Some(err) = &self.reject {
            return Err(err.clone());
        }
        Ok(Box::pin(stream::iter(self.fragments.clone())))
    }
}

fn app(provider: Arc<dyn CompletionProvider>) -> Router {
    router(AppState::new(Relay::new(provider, RelaySettings::default())))
}

fn post_chat(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn error_body(response: Response) -> ErrorBody {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn hello_direct() -> String {
    json!({
        "messages": [{"role": "user", "content": "Hello"}],
        "mode": "direct",
    })
    .to_string()
}

#[tokio::test]
async fn end_to_end_direct_mode() {
    let provider = MockProvider::fragments(&["Hi", " there."]);
    let response = app(provider.clone())
        .oneshot(post_chat(hello_direct()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert!(
        headers[header::CACHE_CONTROL]
            .to_str()
            .unwrap()
            .contains("no-cache")
    );

    let body = body_bytes(response).await;
    assert_eq!(body, HI_THERE.as_bytes());
    assert_eq!(provider.calls(), 1);

    let params = provider.last.lock().unwrap().clone().unwrap();
    assert!(params.stream);
    assert_eq!(params.messages.len(), 2);
    assert_eq!(params.messages[0].role, CompletionRole::System);
    assert_eq!(
        params.messages[0].content,
        Mode::Direct.descriptor().system_prompt
    );
    assert_eq!(params.messages[1].content, "Hello");

    // Feed the same bytes through the client-side consumer.
    let mut conversation = Conversation::start(Mode::Direct, moderelay::today());
    conversation.push_user("Hello");
    conversation.begin_turn();
    let chunks = stream::iter(vec![Ok::<_, std::io::Error>(body)]);
    let outcome = read_turn(chunks, &mut conversation, |_, _| {}, Default::default()).await;
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(conversation.messages().last().unwrap().content, "Hi there.");
}

#[tokio::test]
async fn get_on_chat_is_method_not_allowed() {
    let provider = MockProvider::fragments(&["never"]);
    let response = app(provider.clone()).oneshot(get("/api/chat")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        error_body(response).await,
        ErrorBody::new("Method not allowed")
    );
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn unknown_mode_is_rejected_without_upstream_call() {
    let provider = MockProvider::fragments(&["never"]);
    let body = json!({
        "messages": [{"role": "user", "content": "Hello"}],
        "mode": "nonexistent",
    });
    let response = app(provider.clone())
        .oneshot(post_chat(body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await, ErrorBody::new("Invalid mode"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let provider = MockProvider::fragments(&["never"]);
    for body in [
        json!({"mode": "direct"}),
        json!({"messages": [{"role": "user", "content": "Hello"}]}),
        json!({}),
    ] {
        let response = app(provider.clone())
            .oneshot(post_chat(body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_body(response).await,
            ErrorBody::new("Missing messages or mode")
        );
    }

    let response = app(provider.clone())
        .oneshot(post_chat("{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = error_body(response).await;
    assert_eq!(body.error, INVALID_BODY);
    assert!(body.details.is_some_and(|d| d.contains("line 1 column 2")));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn setup_failure_is_a_structured_500() {
    let provider = MockProvider::rejecting(Error::connection("connection refused", None));
    let response = app(provider.clone())
        .oneshot(post_chat(hello_direct()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(response).await;
    assert_eq!(body.error, CHAT_FAILED);
    assert_eq!(
        body.details.as_deref(),
        Some("Connection error: connection refused")
    );
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn mid_stream_failure_closes_without_done() {
    let provider =
        MockProvider::failing_after(&["Par", "tial"], Error::streaming("reset by peer", None));
    let response = app(provider).oneshot(post_chat(hello_direct())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(
        body,
        "data: {\"content\":\"Par\"}\n\ndata: {\"content\":\"tial\"}\n\n".as_bytes()
    );

    let mut conversation = Conversation::start(Mode::Direct, moderelay::today());
    conversation.begin_turn();
    let chunks = stream::iter(vec![Ok::<_, std::io::Error>(body)]);
    let outcome = read_turn(chunks, &mut conversation, |_, _| {}, Default::default()).await;
    assert_eq!(outcome, TurnOutcome::Truncated);
    assert_eq!(conversation.messages().last().unwrap().content, "Partial");
}

#[tokio::test]
async fn fragments_containing_markers_and_newlines_survive() {
    let provider = MockProvider::fragments(&["[DONE]", "line\n\nbreak", "\"quoted\""]);
    let response = app(provider).oneshot(post_chat(hello_direct())).await.unwrap();
    let body = body_bytes(response).await;

    let mut conversation = Conversation::start(Mode::Direct, moderelay::today());
    conversation.begin_turn();
    let chunks = stream::iter(vec![Ok::<_, std::io::Error>(body)]);
    let outcome = read_turn(chunks, &mut conversation, |_, _| {}, Default::default()).await;
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(
        conversation.messages().last().unwrap().content,
        "[DONE]line\n\nbreak\"quoted\""
    );
}

#[tokio::test]
async fn mode_listing() {
    let provider = MockProvider::fragments(&[]);
    let response = app(provider.clone()).oneshot(get("/api/modes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let modes: Vec<ModeSummary> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let ids: Vec<Mode> = modes.iter().map(|m| m.id).collect();
    assert_eq!(ids, Mode::ALL.to_vec());
    assert!(modes.iter().all(|m| m.welcome.is_none()));

    let response = app(provider.clone())
        .oneshot(get("/api/modes/blackflag"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mode: ModeSummary = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(mode.id, Mode::BlackFlag);
    assert_eq!(mode.name, "Black Flag Mode");
    assert!(mode.welcome.unwrap().contains("Black Flag Mode"));

    let response = app(provider.clone())
        .oneshot(get("/api/modes/nonexistent"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_body(response).await, ErrorBody::new("Invalid mode"));
}

#[tokio::test]
async fn health() {
    let response = app(MockProvider::fragments(&[]))
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app(MockProvider::fragments(&[]))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

///////////////////////////////////////// Mock upstream /////////////////////////////////////////

#[derive(Clone, Default)]
struct Upstream {
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    body: axum::Json<Value>,
) -> Response {
    upstream.requests.lock().unwrap().push(body.0);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .is_some_and(|v| v == "Bearer test-key");
    if !authorized {
        let error = json!({"error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error",
        }});
        return (StatusCode::UNAUTHORIZED, axum::Json(error)).into_response();
    }
    let sse = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\r\n\r\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" there.\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), upstream)
}

#[tokio::test]
async fn relay_through_openai_client() {
    let (base_url, upstream) = spawn_upstream().await;
    let client = OpenAi::with_options(Some("test-key".to_string()), Some(base_url), None).unwrap();
    let relay = Relay::new(
        Arc::new(client),
        RelaySettings {
            model: "gpt-test".to_string(),
            max_completion_tokens: 256,
        },
    );
    let response = router(AppState::new(relay))
        .oneshot(post_chat(hello_direct()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, HI_THERE.as_bytes());

    let requests = upstream.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["model"], "gpt-test");
    assert_eq!(request["stream"], true);
    assert_eq!(request["max_completion_tokens"], 256);
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][1], json!({"role": "user", "content": "Hello"}));
}

#[tokio::test]
async fn upstream_rejection_is_a_structured_500() {
    let (base_url, _upstream) = spawn_upstream().await;
    let client = OpenAi::with_options(Some("wrong-key".to_string()), Some(base_url), None).unwrap();
    let relay = Relay::new(Arc::new(client), RelaySettings::default());
    let response = router(AppState::new(relay))
        .oneshot(post_chat(hello_direct()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(response).await;
    assert_eq!(body.error, CHAT_FAILED);
    assert_eq!(
        body.details.as_deref(),
        Some("Authentication error: Incorrect API key provided")
    );
}

#[tokio::test]
async fn unreachable_upstream_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = OpenAi::with_options(
        Some("test-key".to_string()),
        Some(format!("http://{addr}/v1")),
        None,
    )
    .unwrap();
    let params = ChatCompletionCreateParams::new("gpt-test".to_string(), vec![], 16);
    let err = client.stream_completion(params).await.err().unwrap();
    assert!(err.is_connection());
}
