//! `jarvis ask` - put a question to a running server

use anyhow::Result;

use jarvis::api::{QueryRequest, QueryResponse};
use jarvis::client::JarvisClient;

fn render(response: &QueryResponse) -> String {
    let mut out = String::new();
    out.push_str(&format!("🤖 {}\n\n", response.response));
    out.push_str(&format!(
        "   Category: {}   Backend: {} ({})\n",
        response.category, response.backend, response.model
    ));
    out.push_str(&format!(
        "   Time: {:.2}s   Tokens: {}{}\n",
        response.response_time_seconds,
        response.tokens_used,
        if response.fallback_used {
            "   ⚠️  fallback used"
        } else {
            ""
        }
    ));
    out.push_str(&format!("   Sources: {}", response.sources.join(", ")));
    out
}

pub fn execute(client: &JarvisClient, message: String, backend: Option<String>) -> Result<()> {
    let request = QueryRequest {
        message,
        user_id: "cli_user".to_string(),
        force_backend: backend,
    };

    let response = client.query(&request)?;
    println!("{}", render(&response));
    Ok(())
}
