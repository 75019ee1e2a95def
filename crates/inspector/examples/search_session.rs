//! Search session example - incremental search while the page changes

use dom::{DomService, NodeId};
use inspector::{DomAgent, InspectorConfig};
use std::time::Duration;
use tokio::sync::mpsc;

const SNAPSHOT: &str = r##"{
  "root": {
    "nodeType": 9,
    "nodeName": "#document",
    "children": [{
      "nodeType": 1,
      "nodeName": "html",
      "children": [
        { "nodeType": 1, "nodeName": "head" },
        {
          "nodeType": 1,
          "nodeName": "body",
          "children": [
            {
              "nodeType": 1,
              "nodeName": "div",
              "attributes": ["id", "main", "class", "card"],
              "children": [{ "nodeType": 3, "nodeValue": "Hello from the main card" }]
            },
            {
              "nodeType": 1,
              "nodeName": "iframe",
              "contentDocument": {
                "nodeType": 9,
                "nodeName": "#document",
                "children": [{
                  "nodeType": 1,
                  "nodeName": "p",
                  "attributes": ["class", "card"],
                  "children": [{ "nodeType": 3, "nodeValue": "Hello from a frame" }]
                }]
              }
            }
          ]
        }
      ]
    }]
  }
}"##;

enum Command {
    AddCard(&'static str),
    RemoveMain,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut service = DomService::new();
    let root = service.load_document_str(SNAPSHOT)?;
    let mut arena = service.into_arena();
    let body: NodeId = arena.find_by_tag("body")[0];

    let mut agent = DomAgent::with_config(InspectorConfig {
        search_tick_interval: Duration::from_millis(100),
        ..Default::default()
    });

    // Print everything the client would receive
    let mut event_rx = agent.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!("📢 {}", serde_json::to_string(&event).unwrap_or_default());
        }
    });

    agent.set_document(&arena, Some(root));
    agent.perform_search(&arena, "hello", false);
    println!("🔍 Searching for \"hello\"");

    // Simulated page activity while the search runs
    let (tx, mut rx) = mpsc::channel(4);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let _ = tx.send(Command::AddCard("Hello from a late card")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(Command::RemoveMain).await;
    });

    loop {
        tokio::select! {
            _ = agent.search_tick() => {
                agent.on_match_jobs_timer(&arena);
                if !agent.search().timer().is_active() {
                    println!("✅ Search done: {} match(es)", agent.search().results().len());
                }
            }
            command = rx.recv() => match command {
                Some(Command::AddCard(text)) => {
                    let card = arena.create_element("div");
                    let content = arena.create_text(text);
                    arena.append_child(card, content)?;
                    arena.append_child(body, card)?;
                    agent.did_insert_dom_node(&arena, card);
                }
                Some(Command::RemoveMain) => {
                    if let Some(main) = arena.find_by_id("main") {
                        agent.will_remove_dom_node(&arena, main);
                        arena.remove_child(body, main)?;
                    }
                }
                None => break,
            },
        }
    }

    // Detached but still addressable
    println!(
        "📍 Dangling subtrees: {}, live handles: {}",
        agent.binder().dangling().len(),
        agent.binder().bound_count()
    );

    agent.release_dangling_nodes();
    agent.set_document(&arena, None);

    // Let the printer drain
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
