// src/core/prompts.rs
//! Structured prompts for each AI generation kind

use crate::types::response::{GenerationContext, GenerationKind};

pub const SYSTEM_PROMPT: &str = "You are an experienced resume writer. \
You write concise, specific, results-oriented text in the first person without pronouns. \
Never invent employers, degrees, numbers or dates that were not provided. \
Return only the requested text, with no heading, preamble or markdown formatting.";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: &'static str,
    pub user: String,
}

/// Build the prompt for a generation kind, or name the context field it is missing
pub fn build_prompt(kind: GenerationKind, ctx: &GenerationContext) -> Result<Prompt, String> {
    let user = match kind {
        GenerationKind::Summary => summary_prompt(ctx)?,
        GenerationKind::Experience => experience_prompt(ctx)?,
        GenerationKind::Skills => skills_prompt(ctx)?,
        GenerationKind::Improve => improve_prompt(ctx)?,
    };

    Ok(Prompt {
        system: SYSTEM_PROMPT,
        user,
    })
}

fn has_text(value: &str) -> bool {
    !value.trim().is_empty()
}

fn summary_prompt(ctx: &GenerationContext) -> Result<String, String> {
    if !has_text(&ctx.job_title) && ctx.skills.is_empty() {
        return Err("jobTitle or skills".to_string());
    }

    let mut prompt = String::from("Write a professional resume summary of 3 to 4 sentences");
    if has_text(&ctx.job_title) {
        prompt.push_str(&format!(" for a {}", ctx.job_title.trim()));
    }
    if let Some(years) = ctx.years_of_experience {
        prompt.push_str(&format!(" with {} years of experience", years));
    }
    prompt.push_str(".\n");

    if !ctx.skills.is_empty() {
        prompt.push_str(&format!("Key skills: {}.\n", ctx.skills.join(", ")));
    }
    if has_text(&ctx.summary) {
        prompt.push_str(&format!(
            "Current draft to build on:\n{}\n",
            ctx.summary.trim()
        ));
    }
    prompt.push_str("Return only the summary paragraph.");
    Ok(prompt)
}

fn experience_prompt(ctx: &GenerationContext) -> Result<String, String> {
    if !has_text(&ctx.position) {
        return Err("position".to_string());
    }

    let mut prompt = format!(
        "Write 3 to 5 achievement-focused bullet points describing the role of {}",
        ctx.position.trim()
    );
    if has_text(&ctx.company) {
        prompt.push_str(&format!(" at {}", ctx.company.trim()));
    }
    prompt.push_str(".\n");

    if has_text(&ctx.description) {
        prompt.push_str(&format!(
            "Notes from the candidate:\n{}\n",
            ctx.description.trim()
        ));
    }
    if !ctx.skills.is_empty() {
        prompt.push_str(&format!("Relevant skills: {}.\n", ctx.skills.join(", ")));
    }
    prompt.push_str(
        "Start every bullet with \"- \" followed by a strong action verb. Return only the bullets.",
    );
    Ok(prompt)
}

fn skills_prompt(ctx: &GenerationContext) -> Result<String, String> {
    if !has_text(&ctx.job_title) {
        return Err("jobTitle".to_string());
    }

    let mut prompt = format!(
        "List 10 to 15 skills that employers expect from a {}.\n",
        ctx.job_title.trim()
    );
    if !ctx.skills.is_empty() {
        prompt.push_str(&format!(
            "Do not repeat these skills the candidate already listed: {}.\n",
            ctx.skills.join(", ")
        ));
    }
    prompt.push_str("Return a single comma-separated list and nothing else.");
    Ok(prompt)
}

fn improve_prompt(ctx: &GenerationContext) -> Result<String, String> {
    if !has_text(&ctx.text) {
        return Err("text".to_string());
    }

    let mut prompt = String::from(
        "Rewrite the following resume text so it is clearer, more concise and focused on results. \
Keep every fact unchanged and keep the same format (paragraph or bullets).\n",
    );
    if has_text(&ctx.job_title) {
        prompt.push_str(&format!("Target role: {}.\n", ctx.job_title.trim()));
    }
    prompt.push_str(&format!("Text:\n{}", ctx.text.trim()));
    Ok(prompt)
}
