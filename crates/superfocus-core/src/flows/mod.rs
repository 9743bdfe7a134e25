//! Feature flows: one validated request in, one checked response out.
//!
//! Every flow builds its conversation from a fixed system preamble plus a
//! templated user prompt, then makes a single structured-generation call.

pub mod homework_feedback;
pub mod homework_plan;
pub mod speech_to_text;
pub mod test_prep;

pub use homework_feedback::homework_feedback;
pub use homework_plan::homework_plan;
pub use speech_to_text::speech_to_text;
pub use test_prep::test_prep;

/// Shared tone guidance prepended to every system prompt.
pub(crate) const TUTOR_PREAMBLE: &str = "You are SuperFocus, a patient and upbeat tutor for school-age students. \
Use simple words, short sentences, and a warm tone. Never include links, personal data, or content unsuitable for children. \
Always answer with JSON that matches the provided schema and nothing else.";
