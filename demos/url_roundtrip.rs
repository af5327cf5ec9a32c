//! Walk a filter manager through a typical list-view session

use list_filter::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "list_filter=debug".into()),
        )
        .init();

    let storage_path = std::env::temp_dir().join("list-filter-demo.json");
    let manager = FilterManager::builder(FilterConfig::with_prefix("orders"))
        .with_storage(FileStorage::new(&storage_path))
        .on_change(|params, query| {
            println!("→ GET /orders?{}  (page {:?})", query, params.page);
        })
        .build()
        .await?;

    println!("Restored state: ?{}\n", manager.query());

    // Initial sync from the address bar
    manager
        .restore_from_query("page=2&sorts=created_at:desc&status=open,pending")
        .await?;

    // User interactions
    manager.set_filter("customer", "Acme, Inc.").await?;
    manager.toggle_sort("amount").await?;
    manager.next_page().await?;

    // Redundant apply: no request is issued
    let outcome = manager.apply(FilterPatch::new()).await?;
    println!("Redundant apply: {:?}", outcome);

    // Server echo
    manager
        .ingest_response(&json!({
            "data": [{"id": 41}, {"id": 42}],
            "page": 2, "total": 42, "from": 21, "to": 40, "pages": 3
        }))
        .await?;

    let meta = manager.response_meta();
    println!(
        "\nShowing {}-{} of {} (next page: {})",
        meta.from,
        meta.to,
        meta.total,
        meta.has_next(manager.state().page.unwrap_or(1))
    );
    println!("Preferences saved to {}", storage_path.display());

    Ok(())
}
