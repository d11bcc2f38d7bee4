//! End-to-end tests against an in-process mock gateway.

use std::convert::Infallible;

use axum::extract::Json;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::StreamExt;
use http::StatusCode;
use serde_json::{json, Value};
use tensorzero_client::{
    collect_chunks, ClientBuilder, ClientBuilderMode, ClientInferenceParams, ClientInput,
    ClientInputMessage, ClientInputMessageContent, ContentBlockChatOutput, FeedbackParams,
    FinishReason, InferenceOutput, InferenceResponse, Role, TensorZeroError, TextKind, Usage,
};
use url::Url;

const INFERENCE_ID: &str = "01920c75-d114-7f80-9f93-a2cbd1a37496";
const EPISODE_ID: &str = "01920c75-d114-7f80-9f93-b2dca6b9a0f4";

async fn mock_inference(Json(body): Json<Value>) -> Response {
    let function_name = body["function_name"].as_str().unwrap_or_default();
    if function_name == "missing_function" {
        return (
            StatusCode::NOT_FOUND,
            json!({"error": "Unknown function: missing_function"}).to_string(),
        )
            .into_response();
    }
    // Echo the variant name so concurrent calls can tell responses apart
    let variant_name = body["variant_name"].as_str().unwrap_or("baseline").to_string();
    if body["stream"].as_bool().unwrap_or(false) {
        let chunks = vec![
            json!({
                "inference_id": INFERENCE_ID,
                "episode_id": EPISODE_ID,
                "variant_name": variant_name,
                "content": [{"type": "text", "id": "0", "text": "Hello,"}],
                "usage": {"input_tokens": 10, "output_tokens": null}
            }),
            json!({
                "inference_id": INFERENCE_ID,
                "episode_id": EPISODE_ID,
                "variant_name": variant_name,
                "content": [{"type": "text", "id": "0", "text": " world!"}]
            }),
            json!({
                "inference_id": INFERENCE_ID,
                "episode_id": EPISODE_ID,
                "variant_name": variant_name,
                "content": [],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "finish_reason": "stop"
            }),
        ];
        let events = futures::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<Event, Infallible>(Event::default().data(chunk.to_string())))
                .chain(std::iter::once(Ok(Event::default().data("[DONE]")))),
        );
        Sse::new(events).into_response()
    } else {
        Json(json!({
            "inference_id": INFERENCE_ID,
            "episode_id": EPISODE_ID,
            "variant_name": variant_name,
            "content": [{"type": "text", "text": "Hello, world!"}],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "finish_reason": "stop"
        }))
        .into_response()
    }
}

async fn mock_feedback(Json(body): Json<Value>) -> Response {
    if body.get("metric_name").and_then(Value::as_str).is_none() {
        return (StatusCode::BAD_REQUEST, "Missing metric_name").into_response();
    }
    Json(json!({"feedback_id": "01920c75-d114-7f80-9f93-c3edb7c0b102"})).into_response()
}

fn mock_gateway_router() -> Router {
    Router::new()
        .route("/inference", post(mock_inference))
        .route("/feedback", post(mock_feedback))
}

async fn start_mock_gateway() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock gateway");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, mock_gateway_router())
            .await
            .expect("Mock gateway crashed");
    });
    Url::parse(&format!("http://{addr}/")).expect("Failed to parse mock gateway URL")
}

fn simple_params(function_name: &str) -> ClientInferenceParams {
    ClientInferenceParams {
        function_name: Some(function_name.to_string()),
        input: ClientInput {
            system: None,
            messages: vec![ClientInputMessage {
                role: Role::User,
                content: vec![ClientInputMessageContent::Text(TextKind::Text {
                    text: "Say hello".to_string(),
                })],
            }],
        },
        ..Default::default()
    }
}

async fn make_client(base_url: Url) -> tensorzero_client::Client {
    ClientBuilder::new(ClientBuilderMode::HTTPGateway { url: base_url })
        .build()
        .await
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_non_streaming_inference() {
    let client = make_client(start_mock_gateway().await).await;
    let output = client
        .inference(simple_params("generate_greeting"))
        .await
        .expect("Inference failed");
    let InferenceOutput::NonStreaming(InferenceResponse::Chat(response)) = output else {
        panic!("Expected non-streaming chat response");
    };
    assert_eq!(
        response.content,
        vec![ContentBlockChatOutput::Text(tensorzero_client::Text {
            text: "Hello, world!".to_string()
        })]
    );
    assert_eq!(
        response.usage,
        Usage {
            input_tokens: Some(10),
            output_tokens: Some(5)
        }
    );
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn test_streaming_inference_and_reassembly() {
    let client = make_client(start_mock_gateway().await).await;
    let mut params = simple_params("generate_greeting");
    params.stream = Some(true);
    let output = client.inference(params).await.expect("Inference failed");
    let InferenceOutput::Streaming(mut stream) = output else {
        panic!("Expected streaming response");
    };

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("Stream chunk failed"));
    }
    assert_eq!(chunks.len(), 3);

    let response = collect_chunks(chunks).expect("Failed to assemble chunks");
    let InferenceResponse::Chat(chat) = response else {
        panic!("Expected chat response");
    };
    assert_eq!(
        chat.content,
        vec![ContentBlockChatOutput::Text(tensorzero_client::Text {
            text: "Hello, world!".to_string()
        })]
    );
    assert_eq!(
        chat.usage,
        Usage {
            input_tokens: Some(10),
            output_tokens: Some(5)
        }
    );
    assert_eq!(chat.finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn test_gateway_error_is_http_variant() {
    let client = make_client(start_mock_gateway().await).await;
    let err = client
        .inference(simple_params("missing_function"))
        .await
        .expect_err("Expected inference to fail");
    let TensorZeroError::Http { status_code, text, .. } = &err else {
        panic!("Expected HTTP error: {err}");
    };
    assert_eq!(*status_code, 404);
    assert!(
        text.as_deref().unwrap_or_default().contains("missing_function"),
        "Bad error body: {text:?}"
    );
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_transport_error_is_other_variant() {
    // Nothing is listening here
    let url = Url::parse("http://127.0.0.1:1/").expect("Failed to parse URL");
    let client = make_client(url).await;
    let err = client
        .inference(simple_params("generate_greeting"))
        .await
        .expect_err("Expected inference to fail");
    assert!(matches!(err, TensorZeroError::Other { .. }));
    assert!(err.is_client_error());
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn test_feedback() {
    let client = make_client(start_mock_gateway().await).await;
    let response = client
        .feedback(FeedbackParams {
            inference_id: Some(INFERENCE_ID.parse().expect("Failed to parse UUID")),
            metric_name: "task_success".to_string(),
            value: json!(true),
            ..Default::default()
        })
        .await
        .expect("Feedback failed");
    assert_eq!(
        response.feedback_id.to_string(),
        "01920c75-d114-7f80-9f93-c3edb7c0b102"
    );
}

#[tokio::test]
async fn test_concurrent_inference_on_one_client() {
    let client = make_client(start_mock_gateway().await).await;
    let mut params_a = simple_params("generate_greeting");
    params_a.variant_name = Some("variant_a".to_string());
    let mut params_b = simple_params("generate_greeting");
    params_b.variant_name = Some("variant_b".to_string());

    let (a, b) = tokio::join!(client.inference(params_a), client.inference(params_b));
    let (a, b) = (a.expect("Inference failed"), b.expect("Inference failed"));
    let (InferenceOutput::NonStreaming(a), InferenceOutput::NonStreaming(b)) = (a, b) else {
        panic!("Expected non-streaming responses");
    };
    assert_eq!(a.variant_name(), "variant_a");
    assert_eq!(b.variant_name(), "variant_b");
}

#[test]
fn test_blocking_client() {
    // The blocking client owns its own runtime, so the mock gateway needs
    // one of its own on a separate thread.
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build server runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind mock gateway");
            addr_tx
                .send(listener.local_addr().expect("Failed to get local addr"))
                .expect("Failed to send addr");
            axum::serve(listener, mock_gateway_router())
                .await
                .expect("Mock gateway crashed");
        });
    });
    let addr = addr_rx.recv().expect("Failed to receive addr");
    let url = Url::parse(&format!("http://{addr}/")).expect("Failed to parse URL");

    let client = tensorzero_client::blocking::ClientBuilder::new(ClientBuilderMode::HTTPGateway {
        url,
    })
    .build()
    .expect("Failed to build blocking client");

    let output = client
        .inference(simple_params("generate_greeting"))
        .expect("Inference failed");
    let tensorzero_client::blocking::InferenceOutput::NonStreaming(InferenceResponse::Chat(
        response,
    )) = output
    else {
        panic!("Expected non-streaming chat response");
    };
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));

    let mut params = simple_params("generate_greeting");
    params.stream = Some(true);
    let output = client.inference(params).expect("Inference failed");
    let tensorzero_client::blocking::InferenceOutput::Streaming(stream) = output else {
        panic!("Expected streaming response");
    };
    let chunks: Vec<_> = stream
        .map(|chunk| chunk.expect("Stream chunk failed"))
        .collect();
    assert_eq!(chunks.len(), 3);
    let response = collect_chunks(chunks).expect("Failed to assemble chunks");
    assert_eq!(response.finish_reason(), Some(FinishReason::Stop));
}
