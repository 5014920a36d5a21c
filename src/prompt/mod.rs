// src/prompt/mod.rs
// Pure prompt builders for each generation stage. No I/O; the caller
// validates the context before any of these run.
//
// Target counts are embedded verbatim in the prompt text so the schema
// validator's expectations stay self-consistent with what was asked of
// the model.

use crate::types::GenerationContext;

/// System/user prompt pair for one generation stage.
#[derive(Debug, Clone)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Shared system prompt: copywriter persona, optional brand voice, and the
/// strict-JSON enforcement block.
fn base_system_prompt(ctx: &GenerationContext) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are an expert quiz copywriter for lead-magnet campaigns. ");
    prompt.push_str("You write engaging, specific content that converts casual visitors into leads.\n\n");

    if let Some(voice) = &ctx.brand_voice {
        prompt.push_str("Brand voice to write in: ");
        prompt.push_str(voice);
        prompt.push_str("\n\n");
    }

    prompt.push_str("CRITICAL: Your entire reply MUST be a single valid JSON object. ");
    prompt.push_str("Never add anything before or after the JSON. ");
    prompt.push_str("No markdown, no code fences, no commentary.");

    prompt
}

fn audience_block(ctx: &GenerationContext) -> String {
    format!(
        "Audience: {}\nBusiness goal: {}\nNiche/topic: {}\n\n",
        ctx.audience, ctx.goal, ctx.niche
    )
}

/// Stage 1: generate the quiz questions.
pub fn build_questions_prompt(ctx: &GenerationContext) -> PromptPair {
    let mut user = String::new();
    user.push_str(&audience_block(ctx));

    user.push_str(&format!(
        "Write exactly {} quiz questions for a personality-style lead-magnet quiz.\n",
        ctx.question_count
    ));
    user.push_str("Each question must have 3 to 4 answer options. ");
    user.push_str("Questions should feel personal and specific to the niche, never generic.\n\n");

    user.push_str("Respond with a JSON object of this exact shape:\n");
    user.push_str("{\"questions\": [{\"text\": \"...\", \"answers\": [{\"text\": \"...\"}]}]}\n");
    user.push_str(&format!(
        "The \"questions\" array must contain exactly {} entries.",
        ctx.question_count
    ));

    PromptPair {
        system: base_system_prompt(ctx),
        user,
    }
}

/// Stage 2: generate the result buckets. Takes stage 1's question texts so
/// result naming stays topically coherent with what was actually asked.
pub fn build_results_prompt(ctx: &GenerationContext, question_texts: &[String]) -> PromptPair {
    let mut user = String::new();
    user.push_str(&audience_block(ctx));

    user.push_str(&format!(
        "Write exactly {} distinct personality results for a lead-magnet quiz.\n",
        ctx.result_count
    ));
    user.push_str("Each result needs a memorable name, one emoji, a 2-3 sentence summary, ");
    user.push_str("a list of 3-5 personality traits, and one concrete recommendation ");
    user.push_str("that moves the reader toward the business goal.\n\n");

    if !question_texts.is_empty() {
        user.push_str("The quiz asks these questions, so the results must fit them:\n");
        for text in question_texts {
            user.push_str("- ");
            user.push_str(text);
            user.push('\n');
        }
        user.push('\n');
    }

    user.push_str("Respond with a JSON object of this exact shape:\n");
    user.push_str("{\"results\": [{\"name\": \"...\", \"emoji\": \"...\", \"summary\": \"...\", \"traits\": [\"...\"], \"recommendation\": \"...\"}]}\n");
    user.push_str(&format!(
        "The \"results\" array must contain exactly {} entries.",
        ctx.result_count
    ));

    PromptPair {
        system: base_system_prompt(ctx),
        user,
    }
}

/// Unified flow: one call that produces the whole quiz, including the
/// answer-to-result assignment.
pub fn build_unified_prompt(ctx: &GenerationContext) -> PromptPair {
    let mut user = String::new();
    user.push_str(&audience_block(ctx));

    user.push_str(&format!(
        "Write a complete personality-style lead-magnet quiz with exactly {} questions and exactly {} results.\n",
        ctx.question_count, ctx.result_count
    ));
    user.push_str("Each question must have 3 to 4 answer options. ");
    user.push_str(&format!(
        "Every answer must carry a \"resultIndex\" integer between 0 and {} inclusive, ",
        ctx.result_count.saturating_sub(1)
    ));
    user.push_str("pointing at the result that answer is evidence for. ");
    user.push_str("Spread the indexes so every result is reachable.\n\n");

    user.push_str("Respond with a JSON object of this exact shape:\n");
    user.push_str("{\"title\": \"...\", \"subtitle\": \"...\", ");
    user.push_str("\"questions\": [{\"text\": \"...\", \"answers\": [{\"text\": \"...\", \"resultIndex\": 0}]}], ");
    user.push_str("\"results\": [{\"name\": \"...\", \"emoji\": \"...\", \"summary\": \"...\", \"traits\": [\"...\"], \"recommendation\": \"...\"}]}\n");
    user.push_str(&format!(
        "The \"questions\" array must contain exactly {} entries and the \"results\" array exactly {}.",
        ctx.question_count, ctx.result_count
    ));

    PromptPair {
        system: base_system_prompt(ctx),
        user,
    }
}
