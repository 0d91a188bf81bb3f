//! Prompt composer — builds the instruction strings sent to the model.
//!
//! Two output contracts exist and are distinguishable by prompt: the
//! blocking contract (one `{reply, action}` JSON object) and the streaming
//! contract (`<PARA>` paragraph units, then exactly one `<JSON>` unit with
//! the same shape). A third composer covers job ranking.

use serde_json::Value;

use crate::chat::context::ContextSnapshot;
use crate::chat::stream::{FINAL_CLOSE, FINAL_OPEN, PARA_CLOSE, PARA_OPEN};

/// Navigation targets the assistant may put in a NAVIGATE action.
const KNOWN_ROUTES: &str = r#"- "take me to job applications" -> NAVIGATE "/job-applications"
- "go to available jobs" -> NAVIGATE "/jobs"
- profile, about, contact pages -> NAVIGATE "/profile", "/about", "/contact-us"
- home -> NAVIGATE "/"
- "how many jobs", "jobs from X", "skills to improve" -> analyze the data and answer, no action"#;

fn context_block(ctx: &ContextSnapshot) -> String {
    format!(
        "USER ROLE: {role}\n\n\
         USER PROFILE:\n{profile}\n\n\
         ALL JOBS:\n{jobs}\n\n\
         USER APPLICATIONS:\n{apps}",
        role = ctx.role.as_str(),
        profile = pretty(&ctx.profile),
        jobs = pretty_list(&ctx.jobs),
        apps = pretty_list(&ctx.applications),
    )
}

/// Instruction set for the streaming contract.
pub fn compose_streaming_prompt(ctx: &ContextSnapshot, user_message: &str) -> String {
    format!(
        "You are JobHub's AI assistant.\n\n\
         {context}\n\n\
         IMPORTANT STREAMING FORMAT:\n\
         - Respond using {PARA_OPEN} blocks for human-readable paragraphs.\n\
         - Each {PARA_OPEN}...{PARA_CLOSE} block must contain one full paragraph; never split words across blocks.\n\
         - Do not repeat content across blocks; each paragraph continues from the previous one.\n\
         - After all paragraph blocks, output exactly ONE {FINAL_OPEN}...{FINAL_CLOSE} block with the final JSON payload.\n\n\
         Recognized intents:\n{KNOWN_ROUTES}\n\n\
         Final JSON format (wrapped in {FINAL_OPEN}...{FINAL_CLOSE}):\n\
         {FINAL_OPEN}\n\
         {{\n  \"reply\": \"<short human summary>\",\n  \"action\": null OR {{\"type\": \"NAVIGATE\", \"url\": \"<path>\"}}\n}}\n\
         {FINAL_CLOSE}\n\n\
         USER: {user_message}",
        context = context_block(ctx),
    )
}

/// Instruction set for the blocking contract.
pub fn compose_blocking_prompt(ctx: &ContextSnapshot, user_message: &str) -> String {
    format!(
        "You are JobHub's AI assistant.\n\n\
         {context}\n\n\
         Recognized intents:\n{KNOWN_ROUTES}\n\n\
         Respond with ONE JSON object and nothing else:\n\
         {{\n  \"reply\": \"<short human summary>\",\n  \"action\": null OR {{\"type\": \"NAVIGATE\", \"url\": \"<path>\"}}\n}}\n\n\
         USER: {user_message}",
        context = context_block(ctx),
    )
}

/// Instruction set for the job-ranking contract.
pub fn compose_ranking_prompt(profile: &Value, jobs: &[Value]) -> String {
    format!(
        "You are a job recommendation engine that outputs clean JSON only.\n\n\
         Given the job seeker's profile:\n{profile}\n\n\
         Rank the following jobs by how well they match the profile. Consider\n\
         skill match, specialization, and experience relevance, and give a\n\
         one-line reason naming what matched most strongly.\n\n\
         Return only valid JSON in this format:\n\
         {{\n  \"ranked_jobs\": [\n    {{\"id\": <job_id>, \"match_score\": <0-100>, \"reason\": \"<one line>\"}}\n  ]\n}}\n\n\
         Jobs JSON:\n{jobs}",
        profile = pretty(profile),
        jobs = pretty_list(jobs),
    )
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn pretty_list(values: &[Value]) -> String {
    serde_json::to_string_pretty(values).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use serde_json::json;

    fn snapshot() -> ContextSnapshot {
        ContextSnapshot {
            role: Role::JobSeeker,
            profile: json!({"skills": "rust, sql"}),
            jobs: vec![json!({"id": 1, "title": "Backend Engineer"})],
            applications: vec![],
        }
    }

    #[test]
    fn streaming_prompt_states_role_and_markers() {
        let prompt = compose_streaming_prompt(&snapshot(), "hello");
        assert!(prompt.contains("USER ROLE: job_seeker"));
        assert!(prompt.contains(PARA_OPEN));
        assert!(prompt.contains(FINAL_OPEN));
        assert!(prompt.contains("Backend Engineer"));
        assert!(prompt.ends_with("USER: hello"));
    }

    #[test]
    fn blocking_prompt_has_no_stream_markers() {
        let prompt = compose_blocking_prompt(&snapshot(), "hi");
        assert!(prompt.contains("USER ROLE: job_seeker"));
        assert!(!prompt.contains(PARA_OPEN));
        assert!(prompt.contains("\"action\""));
    }

    #[test]
    fn ranking_prompt_embeds_profile_and_jobs() {
        let profile = json!({"skills": "nursing"});
        let jobs = vec![json!({"id": 7, "title": "Night Nurse"})];
        let prompt = compose_ranking_prompt(&profile, &jobs);
        assert!(prompt.contains("nursing"));
        assert!(prompt.contains("Night Nurse"));
        assert!(prompt.contains("ranked_jobs"));
    }
}
