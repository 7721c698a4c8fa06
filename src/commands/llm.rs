//! `jarvis status`, `jarvis switch` and `jarvis health`

use anyhow::Result;

use jarvis::api::SwitchRequest;
use jarvis::client::JarvisClient;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "✓"
    } else {
        "✗"
    }
}

pub fn status(client: &JarvisClient) -> Result<()> {
    let llm = client.llm_status()?;
    let stats = client.stats()?;
    let status = &llm.status;

    println!("🧠 LLM system\n");
    println!("   Current backend:  {}", status.current_backend);
    println!(
        "   Ollama:           {} {}",
        yes_no(status.primary_available),
        status.primary_model.as_deref().unwrap_or("-")
    );
    println!("   DistilBERT:       {}", yes_no(status.secondary_available));
    if !status.available_models.is_empty() {
        println!("   Models:           {}", status.available_models.join(", "));
    }

    let queries = &status.stats;
    println!(
        "\n   Queries: {}  Ollama ok: {}  Ollama failed: {}  Fallbacks: {}",
        queries.total_queries,
        queries.primary_successes,
        queries.primary_failures,
        queries.fallbacks_used
    );
    println!(
        "   Knowledge: {} documents in {} categories",
        stats.knowledge_base.total_documents,
        stats.knowledge_base.categories.len()
    );
    println!("\n💡 {}", llm.recommendation);

    Ok(())
}

pub fn switch(client: &JarvisClient, backend: String, model: Option<String>) -> Result<()> {
    let response = client.switch(&SwitchRequest {
        backend,
        model_name: model,
    })?;

    let marker = if response.success { "✅" } else { "❌" };
    println!("{} {}", marker, response.message);
    println!("   Active backend: {}", response.backend);
    Ok(())
}

pub fn health(client: &JarvisClient) -> Result<()> {
    let health = client.health()?;

    println!("✅ Jarvis {} at {}", health.status, client.base_url());
    println!("   Version: {}", health.version);
    println!("   Uptime:  {}s", health.uptime_secs);
    println!(
        "   Backend: {} (ollama {})",
        health.llm_details.primary_backend,
        yes_no(health.llm_details.primary_available)
    );
    Ok(())
}
