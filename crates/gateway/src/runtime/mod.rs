//! Core runtime: the turn engine and its helpers.
//!
//! Entry points: [`run_streaming`] spawns a run and returns a channel of
//! [`TurnEvent`](gw_domain::stream::TurnEvent)s for SSE; [`TurnEngine::run_batch`]
//! runs to completion and returns the execution log.

pub mod suggestions;
pub mod turn;

pub use turn::{run_streaming, ChannelSink, RunInput, RunOutcome, TurnEngine, TurnSink};

/// First `max_chars` characters of `s`, with an ellipsis when cut.
pub(crate) fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 5), "héllo…");
        assert_eq!(preview("short", 10), "short");
    }
}
