//! Occasional closing question appended to generated replies.

use rand::seq::SliceRandom;
use rand::Rng;
use relay_core::config::ClosingConfig;

/// Maybe end `reply` with a question from the configured pool.
///
/// Left untouched when it mentions a "final" keyword (case-insensitive),
/// already ends in a question mark, or loses the random draw.
pub fn augment<R: Rng>(reply: String, config: &ClosingConfig, rng: &mut R) -> String {
    if !config.enabled || config.questions.is_empty() {
        return reply;
    }

    let lowered = reply.to_lowercase();
    if config
        .keywords
        .iter()
        .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
    {
        return reply;
    }

    if reply.trim_end().ends_with(['?', '？']) {
        return reply;
    }

    if rng.gen::<f64>() >= config.probability {
        return reply;
    }

    match config.questions.choose(rng) {
        Some(question) => {
            let base = reply.trim_end_matches(['.', '!', '…', ' ']);
            format!("{base} {question}")
        }
        None => reply,
    }
}
