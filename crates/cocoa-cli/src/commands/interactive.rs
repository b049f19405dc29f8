//! Line-driven session on stdin.
//!
//! Plain lines are treated as edited query text and go through the debounce,
//! so pasting several lines quickly only searches the last one.

use std::str::FromStr;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use cocoa_application::SessionController;
use cocoa_core::Mode;

use crate::render::{self, Renderer};

const HELP: &str = "\
  <text>           search (debounced)
  /ask <question>  ask a question
  /resume          continue a paused answer
  /mode search|qa  switch mode
  /clear           clear the search
  /quit            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Query(String),
    Ask(String),
    Resume,
    Mode(Mode),
    Clear,
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Query(line.to_string());
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "ask" if !rest.is_empty() => Input::Ask(rest.to_string()),
        "ask" => Input::Invalid("usage: /ask <question>".to_string()),
        "resume" => Input::Resume,
        "mode" => match Mode::from_str(rest) {
            Ok(mode) => Input::Mode(mode),
            Err(_) => Input::Invalid(format!("unknown mode '{}'", rest)),
        },
        "clear" => Input::Clear,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("unknown command '/{}'", other)),
    }
}

/// Runs until `/quit` or end of input.
pub async fn run(controller: &mut SessionController) -> Result<()> {
    eprintln!("Type to search, /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = Renderer::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Input::Query(text) => controller.query_changed(&text),
                    Input::Ask(question) => controller.submit(&question),
                    Input::Resume => {
                        if !controller.resume() {
                            eprintln!("Nothing to resume.");
                        }
                    }
                    Input::Mode(mode) => controller.set_mode(mode),
                    Input::Clear => controller.query_changed(""),
                    Input::Help => eprintln!("{}", HELP),
                    Input::Quit => break,
                    Input::Invalid(message) => eprintln!("{}", message),
                }
            }
            Some(event) = controller.next_event() => {
                let was_active = controller.is_active();
                controller.handle_event(event);
                if was_active && !controller.is_active() && controller.mode() == Mode::Qa {
                    renderer.update(&controller.snapshot());
                    render::print_sources(&controller.snapshot().qa);
                    continue;
                }
            }
        }
        renderer.update(&controller.snapshot());
    }

    controller.close();
    Ok(())
}
