//! Prompt templates for meme scoring.
//!
//! Templates use `{key}` placeholders filled by [`render_template`].

/// System prompt for meme scoring.
pub const MEME_SCORE_SYSTEM: &str = r"You are a meme critic judging entries in a meme battle.
You rate how likely a meme is to go viral on social media.

RULES:
- Judge only the meme you are given. Do not invent other memes.
- The score is an integer from 0 (dead on arrival) to 100 (guaranteed viral).
- The verdict is one sentence.
- List at most three strengths, each a few words.
- Your response must be valid JSON.";

/// User prompt for meme scoring.
pub const MEME_SCORE_USER: &str = r#"Battle: {battle_name}
Battle description: {battle_description}

Meme name: {meme_name}
Hashtag: #{meme_hashtag}
Image URL: {meme_image}

Rate this meme. Return JSON:
{{"score": <integer 0-100>, "verdict": "one sentence", "strengths": ["strength", ...]}}"#;

/// GBNF grammar for structured scoring output.
pub const MEME_SCORE_GRAMMAR: &str = r#"root   ::= "{" ws "\"score\"" ws ":" ws score "," ws "\"verdict\"" ws ":" ws string "," ws "\"strengths\"" ws ":" ws array "}" ws
string ::= "\"" ([^"\\] | "\\" .)* "\""
array  ::= "[" ws (string ("," ws string)*)? ws "]"
score  ::= "100" | [1-9]? [0-9]
ws     ::= [ \t\n]*"#;

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value and turns the escaped
/// braces `{{` / `}}` into literal ones.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result.replace("{{", "{").replace("}}", "}")
}

/// Longest user-supplied value placed into a prompt.
const MAX_VAR_CHARS: usize = 300;

/// Trim and truncate user-supplied text before it goes into a prompt.
#[must_use]
pub fn sanitize_var(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .take(MAX_VAR_CHARS)
        .collect()
}
