//! Incremental terminal output for session snapshots.
//!
//! Results go to stdout, status lines to stderr. The renderer remembers what it
//! already printed so each snapshot only adds the new part.

use std::io::Write;

use cocoa_application::SessionSnapshot;
use cocoa_core::Mode;
use cocoa_core::qa::QaState;
use cocoa_core::search::{Hit, SearchState};

#[derive(Debug, Default)]
pub struct Renderer {
    status: String,
    search_query: String,
    hits_shown: usize,
    qa_query: String,
    answer_shown: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints whatever `snapshot` adds over the last rendered one.
    pub fn update(&mut self, snapshot: &SessionSnapshot) {
        let status = snapshot.status();
        if !status.is_empty() && status != self.status {
            if self.answer_shown > 0 && snapshot.mode == Mode::Qa {
                println!();
            }
            eprintln!("[{}] {}", snapshot.mode, status);
            self.status = status.to_string();
        }

        match snapshot.mode {
            Mode::Search => self.render_hits(&snapshot.search),
            Mode::Qa => self.render_answer(&snapshot.qa),
        }
    }

    fn render_hits(&mut self, state: &SearchState) {
        if state.query != self.search_query || state.hits.len() < self.hits_shown {
            self.search_query = state.query.clone();
            self.hits_shown = 0;
        }
        for hit in &state.hits[self.hits_shown..] {
            println!("{}", hit_line(hit, state.first_seen.get(&hit.file_id)));
        }
        self.hits_shown = state.hits.len();
    }

    fn render_answer(&mut self, state: &QaState) {
        let answer = state.answer.as_deref().unwrap_or_default();
        if state.query != self.qa_query || answer.len() < self.answer_shown {
            self.qa_query = state.query.clone();
            self.answer_shown = 0;
        }
        if answer.len() > self.answer_shown {
            print!("{}", &answer[self.answer_shown..]);
            let _ = std::io::stdout().flush();
            self.answer_shown = answer.len();
        }
    }
}

/// One result line: first-seen latency, score and label.
pub fn hit_line(hit: &Hit, first_seen_ms: Option<u64>) -> String {
    let seen = first_seen_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string());
    let score = hit
        .score
        .map(|score| format!("{:.2}", score))
        .unwrap_or_else(|| "    ".to_string());
    format!("{:>7}  {}  {}", seen, score, hit.label())
}

/// Lists the sources an answer drew on, marking those that contained an answer.
pub fn print_sources(state: &QaState) {
    if state.hits.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (index, hit) in state.hits.iter().enumerate() {
        let marker = if hit.has_answer == Some(true) { "*" } else { " " };
        print!("  {}{:>2}. {}", marker, index + 1, hit.label());
        if let Some(comment) = &hit.analysis_comment {
            print!("  ({})", comment);
        }
        println!();
    }
}
