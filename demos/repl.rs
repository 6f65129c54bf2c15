//! Throwaway interactive demo: builds a `SearchEngine`, indexes a couple of
//! documents, and runs one prefix and one fuzzy query. Not part of the
//! public library surface.

use lexitrie::{Document, IndexConfig, SearchEngine, SearchOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> lexitrie::Result<()> {
    let config = IndexConfig {
        name: "demo".to_string(),
        version: 1,
        fields: vec!["title".to_string(), "body".to_string()],
        storage: lexitrie::StorageConfig::Memory,
        options: lexitrie::IndexOptions::default(),
    };

    let mut engine = SearchEngine::with_memory_storage(config)?;
    engine.on(|event| println!("[event] {}", event.event_type.as_str()));
    engine.initialize().await?;

    engine
        .add_documents(vec![
            Document::new(
                "",
                json!({"title": "Hello World", "body": "An introduction to lexitrie"})
                    .as_object()
                    .unwrap()
                    .clone(),
            ),
            Document::new(
                "",
                json!({"title": "Fuzzy Matching", "body": "Bounded edit distance search over a trie"})
                    .as_object()
                    .unwrap()
                    .clone(),
            ),
        ])
        .await?;

    println!("-- prefix search for \"hel\" --");
    let prefix_hits = engine.search("hel", SearchOptions::default()).await?;
    for hit in &prefix_hits {
        println!("{} (score {:.2})", hit.id, hit.score);
    }

    println!("-- fuzzy search for \"fuzzi\" --");
    let fuzzy_hits = engine
        .search("fuzzi", SearchOptions { fuzzy: true, ..SearchOptions::default() })
        .await?;
    for hit in &fuzzy_hits {
        println!("{} (score {:.2})", hit.id, hit.score);
    }

    engine.close().await?;
    Ok(())
}
