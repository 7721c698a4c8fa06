//! Model-server client against a scripted fake server
//!
//! Run with: cargo test --test ollama_backend -- --nocapture

use std::net::{Shutdown, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use jarvis::config::OllamaConfig;
use jarvis::generation::{
    GenerationBackend, GenerationError, GenerationRequest, OllamaBackend, PrimaryBackend,
};
use jarvis::server::microserver::{read_request, write_response, HttpRequest, HttpResponse};
use serde_json::{json, Value};

type Handler = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

/// Serve `handler` on an ephemeral port, one thread per connection
fn spawn_fake(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handler: Arc<Handler> = Arc::new(handler);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let handler = Arc::clone(&handler);
            std::thread::spawn(move || {
                if let Some(Ok(request)) = read_request(&mut stream) {
                    write_response(&mut stream, &handler(&request));
                }
                let _ = stream.shutdown(Shutdown::Write);
            });
        }
    });

    format!("http://{}", addr)
}

fn tags(models: &[&str]) -> HttpResponse {
    let models: Vec<Value> = models.iter().map(|m| json!({ "name": m })).collect();
    HttpResponse::json(200, &json!({ "models": models }))
}

fn body(request: &HttpRequest) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

fn config(base_url: String) -> OllamaConfig {
    OllamaConfig {
        base_url,
        connect_timeout_secs: 2,
        read_timeout_secs: 1,
        degraded_timeout_secs: 2,
        availability_attempts: 1,
        retry_backoff_ms: 0,
        ..OllamaConfig::default()
    }
}

fn request<'a>() -> GenerationRequest<'a> {
    GenerationRequest {
        query: "What is a risk appetite statement?",
        context: "Boards define a risk appetite statement.",
        system_prompt: None,
    }
}

#[test]
fn test_selects_preferred_model_and_generates() {
    let url = spawn_fake(|req| match req.path.as_str() {
        "/api/tags" => tags(&["phi", "mistral", "codellama"]),
        "/api/generate" => {
            let body = body(req);
            assert_eq!(body["stream"], false);
            assert_eq!(body["options"]["num_ctx"], 8192);
            assert!(body["prompt"]
                .as_str()
                .unwrap()
                .contains("Context information:\nBoards define"));
            HttpResponse::json(
                200,
                &json!({ "response": "  A board-approved limit. ", "eval_count": 42, "done": true }),
            )
        }
        _ => HttpResponse::empty(404),
    });

    let backend = OllamaBackend::connect(&config(url)).unwrap();
    assert!(backend.is_available());
    assert_eq!(backend.model(), "mistral");

    let generation = backend.generate(&request()).unwrap();
    assert_eq!(generation.text, "A board-approved limit.");
    assert_eq!(generation.model, "mistral");
    assert_eq!(generation.tokens_used, 42);
    assert!(!generation.used_fallback);
}

#[test]
fn test_non_success_retries_with_streaming() {
    let url = spawn_fake(|req| match req.path.as_str() {
        "/api/tags" => tags(&["llama2:7b"]),
        "/api/generate" if body(req)["stream"] == true => HttpResponse {
            status: 200,
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-ndjson".to_string(),
            )],
            body: concat!(
                "{\"response\":\"Three \",\"done\":false}\n",
                "{\"response\":\"lines.\",\"done\":true,\"eval_count\":7}\n",
            )
            .as_bytes()
            .to_vec(),
        },
        "/api/generate" => HttpResponse::json(500, &json!({ "error": "model busy" })),
        _ => HttpResponse::empty(404),
    });

    let backend = OllamaBackend::connect(&config(url)).unwrap();
    let generation = backend.generate(&request()).unwrap();

    assert_eq!(generation.text, "Three lines.");
    assert_eq!(generation.model, "llama2:7b (stream)");
    assert_eq!(generation.tokens_used, 7);
}

#[test]
fn test_timeout_falls_back_to_smaller_model() {
    let url = spawn_fake(|req| match req.path.as_str() {
        "/api/tags" => tags(&["mistral", "tinyllama"]),
        "/api/generate" => {
            let body = body(req);
            if body["model"] == "mistral" {
                std::thread::sleep(Duration::from_secs(3));
                HttpResponse::json(200, &json!({ "response": "too late", "done": true }))
            } else {
                assert_eq!(body["model"], "tinyllama");
                assert_eq!(body["options"]["num_predict"], 128);
                HttpResponse::json(200, &json!({ "response": "Short answer.", "eval_count": 3 }))
            }
        }
        _ => HttpResponse::empty(404),
    });

    let backend = OllamaBackend::connect(&config(url)).unwrap();
    assert_eq!(backend.model(), "mistral");

    let generation = backend.generate(&request()).unwrap();
    assert_eq!(generation.text, "Short answer.");
    assert_eq!(generation.model, "tinyllama (fallback)");
    assert!(generation.used_fallback);
}

#[test]
fn test_unreachable_server_is_unavailable() {
    // Bind then drop to get a port with nothing listening
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let backend = OllamaBackend::connect(&config(format!("http://127.0.0.1:{}", port))).unwrap();
    assert!(!backend.is_available());
    assert_eq!(backend.model(), "llama2:7b");
    assert!(backend.list_models().is_empty());
    assert!(matches!(
        backend.generate(&request()),
        Err(GenerationError::Unavailable)
    ));
}

#[test]
fn test_change_model_requires_installed_model() {
    let url = spawn_fake(|req| match req.path.as_str() {
        "/api/tags" => tags(&["llama2:7b", "phi"]),
        _ => HttpResponse::empty(404),
    });

    let backend = OllamaBackend::connect(&config(url)).unwrap();
    assert_eq!(backend.model(), "llama2:7b");
    assert_eq!(backend.list_models(), vec!["llama2:7b", "phi"]);

    assert!(!backend.change_model("mixtral"));
    assert_eq!(backend.model(), "llama2:7b");

    assert!(backend.change_model("phi"));
    assert_eq!(backend.model(), "phi");
}
