//! Meme scoring prompts: golden test set.
//!
//! Curated inputs for the scoring templates, checked offline for well-formed
//! rendering. Set `MEMEBATTLE_EVAL_LLM=1` with a local Ollama running to also
//! send each case to the model and check the answer parses and lands in range.

use chrono::{Duration, Utc};
use memebattle_core::types::{Battle, Meme};
use memebattle_llm::prompt;
use memebattle_llm::{LlmClient, LlmProvider, MemeScorer};

/// A golden test case for prompt evaluation.
struct GoldenCase {
    /// Human-readable name for the test case.
    name: &'static str,
    /// Template variables to fill in.
    vars: Vec<(&'static str, &'static str)>,
    /// Strings that MUST appear in the rendered prompt.
    prompt_must_contain: Vec<&'static str>,
    /// Strings that MUST NOT appear in the rendered prompt.
    prompt_must_not_contain: Vec<&'static str>,
}

fn vars(
    battle: &'static str,
    description: &'static str,
    meme: &'static str,
    hashtag: &'static str,
    image: &'static str,
) -> Vec<(&'static str, &'static str)> {
    vec![
        ("battle_name", battle),
        ("battle_description", description),
        ("meme_name", meme),
        ("meme_hashtag", hashtag),
        ("meme_image", image),
    ]
}

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            name: "classic_doge",
            vars: vars("Dog Days", "Which dog meme rules", "Doge", "doge", "https://i.imgur.com/doge.png"),
            prompt_must_contain: vec!["Dog Days", "Meme name: Doge", "Hashtag: #doge"],
            prompt_must_not_contain: vec!["{meme_name}", "{battle_name}"],
        },
        GoldenCase {
            name: "frog_meme",
            vars: vars("Frog Wars", "Amphibian supremacy", "Pepe", "pepe", "https://i/pepe.jpg"),
            prompt_must_contain: vec!["Frog Wars", "Pepe", "#pepe", "https://i/pepe.jpg"],
            prompt_must_not_contain: vec!["{meme_image}"],
        },
        GoldenCase {
            name: "unicode_name",
            vars: vars("Anime Hour", "Best reaction face", "\u{1F438} Kermit", "kermit", "https://i/k.gif"),
            prompt_must_contain: vec!["\u{1F438} Kermit"],
            prompt_must_not_contain: vec!["{meme_hashtag}"],
        },
        GoldenCase {
            name: "long_description",
            vars: vars(
                "Distracted Boyfriend Cup",
                "A long-running tournament between variants of the same stock photo, judged by the timeline",
                "Original",
                "distractedboyfriend",
                "https://i/db.png",
            ),
            prompt_must_contain: vec!["stock photo", "#distractedboyfriend"],
            prompt_must_not_contain: vec!["{battle_description}"],
        },
        GoldenCase {
            name: "json_instruction_survives",
            vars: vars("b", "d", "m", "h", "i"),
            prompt_must_contain: vec![r#"{"score": <integer 0-100>"#, "Return JSON"],
            prompt_must_not_contain: vec!["{{", "}}"],
        },
        GoldenCase {
            name: "cat_vs_dog",
            vars: vars("Cats vs Dogs", "Eternal", "Grumpy Cat", "grumpycat", "https://i/grumpy.png"),
            prompt_must_contain: vec!["Grumpy Cat", "Cats vs Dogs"],
            prompt_must_not_contain: vec!["{battle_name}"],
        },
        GoldenCase {
            name: "stonks",
            vars: vars("Finance Bros", "Line goes up", "Stonks", "stonks", "https://i/stonks.png"),
            prompt_must_contain: vec!["Stonks", "Line goes up"],
            prompt_must_not_contain: vec!["{meme_name}"],
        },
        GoldenCase {
            name: "numbers_in_hashtag",
            vars: vars("Y2K", "Retro", "Dancing Baby", "baby1996", "https://i/baby.gif"),
            prompt_must_contain: vec!["#baby1996"],
            prompt_must_not_contain: vec!["{meme_hashtag}"],
        },
        GoldenCase {
            name: "quotes_in_name",
            vars: vars("Quotes", "Testing", "\"This is fine\" dog", "thisisfine", "https://i/fine.png"),
            prompt_must_contain: vec!["\"This is fine\" dog"],
            prompt_must_not_contain: vec!["{meme_name}"],
        },
        GoldenCase {
            name: "sparse_description",
            vars: vars("Minimal", "-", "Nyan Cat", "nyancat", "https://i/nyan.gif"),
            prompt_must_contain: vec!["Battle description: -", "Nyan Cat"],
            prompt_must_not_contain: vec!["{battle_description}"],
        },
    ]
}

#[test]
fn golden_prompts_render_without_unresolved_vars() {
    for case in &golden_cases() {
        let rendered = prompt::render_template(prompt::MEME_SCORE_USER, &case.vars);

        for needle in &case.prompt_must_contain {
            assert!(
                rendered.contains(needle),
                "Golden case '{}': rendered prompt must contain '{}' but doesn't.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }

        for needle in &case.prompt_must_not_contain {
            assert!(
                !rendered.contains(needle),
                "Golden case '{}': rendered prompt must NOT contain '{}' but does.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }
    }
}

#[test]
fn golden_set_has_minimum_coverage() {
    let cases = golden_cases();
    assert!(cases.len() >= 10, "Golden set must have at least 10 test cases, got {}", cases.len());
}

#[test]
fn grammar_is_nonempty() {
    assert!(prompt::MEME_SCORE_GRAMMAR.contains("score"));
    assert!(prompt::MEME_SCORE_GRAMMAR.contains("verdict"));
    assert!(prompt::MEME_SCORE_GRAMMAR.contains("strengths"));
}

#[test]
fn prompts_ask_for_json() {
    assert!(prompt::MEME_SCORE_USER.contains("JSON"));
    assert!(prompt::MEME_SCORE_SYSTEM.contains("valid JSON"));
    assert!(prompt::MEME_SCORE_SYSTEM.contains("You are"));
}

#[tokio::test]
async fn online_eval_against_local_model() {
    if std::env::var("MEMEBATTLE_EVAL_LLM").is_err() {
        return;
    }
    let client = LlmClient::new(
        LlmProvider::Ollama {
            base_url: "http://localhost:11434".into(),
        },
        "qwen2.5:1.5b",
        1,
    );
    let scorer = MemeScorer::new(client, 30_000);
    let battle = Battle::new(
        "Dog Days",
        "Which dog meme rules",
        vec![Meme::new("Doge", "https://i.imgur.com/doge.png", "doge")],
        Utc::now(),
        Duration::seconds(600),
    );
    let score = scorer.score(&battle, &battle.memes[0]).await.expect("model answers");
    assert!(score.score <= 100);
    assert!(!score.verdict.is_empty());
}
