use anyhow::{Result, bail};

use cocoa_application::SessionController;

use crate::render::Renderer;

/// Runs one progressive search to completion.
pub async fn run(controller: &mut SessionController, query: &str, json: bool) -> Result<()> {
    controller.search_now(query);

    let mut renderer = Renderer::new();
    loop {
        let snapshot = controller.snapshot();
        if !json {
            renderer.update(&snapshot);
        }
        if !controller.is_active() {
            break;
        }
        match controller.next_event().await {
            Some(event) => controller.handle_event(event),
            None => break,
        }
    }

    let snapshot = controller.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot.search)?);
    } else if let Some(rewritten) = &snapshot.search.rewritten_query {
        eprintln!("Rewritten query: {}", rewritten);
    }
    if snapshot.decode_failures > 0 {
        tracing::warn!(count = snapshot.decode_failures, "dropped undecodable lines");
    }
    if snapshot.search.error {
        bail!("{}", snapshot.search.status);
    }
    Ok(())
}
