use anyhow::{Result, bail};

use cocoa_application::SessionController;

use crate::render::{self, Renderer};

/// Streams one answer to stdout.
///
/// A paused answer prints its resume token and exits successfully.
pub async fn run(
    controller: &mut SessionController,
    question: &str,
    resume_token: Option<&str>,
) -> Result<()> {
    match resume_token {
        Some(token) => controller.resume_with(question, token),
        None => controller.submit(question),
    }

    let mut renderer = Renderer::new();
    loop {
        renderer.update(&controller.snapshot());
        if !controller.is_active() {
            break;
        }
        match controller.next_event().await {
            Some(event) => controller.handle_event(event),
            None => break,
        }
    }

    let state = controller.snapshot().qa;
    if state.answer.is_some() {
        println!();
    }
    render::print_sources(&state);

    if state.paused {
        if let Some(token) = &state.resume_token {
            eprintln!();
            eprintln!("Paused. Continue with:");
            eprintln!("  cocoa ask --resume {} {:?}", token, state.query);
        }
        return Ok(());
    }
    if state.error {
        bail!("{}", state.status);
    }
    Ok(())
}
