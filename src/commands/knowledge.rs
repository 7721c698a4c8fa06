//! `jarvis search`, `jarvis add` and `jarvis categories`

use anyhow::Result;

use jarvis::api::KnowledgeRequest;
use jarvis::client::JarvisClient;

pub fn search(client: &JarvisClient, query: &str, limit: usize) -> Result<()> {
    let response = client.search(query, limit)?;

    println!("🔍 {} result(s) for \"{}\"\n", response.count, response.query);
    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "{}. [{}] score {:.3}  ({})",
            i + 1,
            hit.category,
            hit.score,
            hit.doc_id
        );
        println!("   {}\n", hit.text);
    }

    Ok(())
}

pub fn add(client: &JarvisClient, text: String, category: String, tags: Vec<String>) -> Result<()> {
    let response = client.add_knowledge(&KnowledgeRequest {
        text,
        category,
        tags,
    })?;

    println!("✅ {}", response.message);
    println!("   id: {}  category: {}", response.doc_id, response.category);
    Ok(())
}

pub fn categories(client: &JarvisClient) -> Result<()> {
    let response = client.categories()?;

    println!("📚 Knowledge categories\n");
    for category in &response.categories {
        let count = response.counts.get(category).copied().unwrap_or(0);
        println!("   {:<12} {}", category, count);
    }

    Ok(())
}
