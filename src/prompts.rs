//! Prompt templates for LLM judgments.
//!
//! Domain logic for rendering judge prompts. Provider-agnostic.

use crate::gateway::Message;

/// Rendered prompt ready for the model.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A judgment prompt with `{input}`, `{output}` and `{criteria}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, input: &str, output: &str, criteria: &str) -> PromptInstance {
        let user = self
            .user
            .replace("{criteria}", &escape_xml_chars(criteria.trim()))
            .replace("{input}", &escape_xml_chars(input.trim()))
            .replace("{output}", &escape_xml_chars(output.trim()));

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: self.system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }

    /// Stable hash of the template text, used in cache keys.
    pub fn hash(&self) -> String {
        blake3::hash(format!("{}\n{}", self.system, self.user).as_bytes())
            .to_hex()
            .to_string()
    }
}

// =============================================================================
// Standard prompts
// =============================================================================

pub const JUDGMENT_V1: PromptTemplate = PromptTemplate {
    slug: "judgment_v1",
    system: r#"You are a strict, impartial evaluator. You decide whether an output satisfies a criterion for a given input. Judge substance, not length or formatting.

Output only valid JSON: {"passed": true|false, "confidence": 0.0-1.0, "reasoning": "<one or two sentences>"}.
Example:
{"passed": true, "confidence": 0.82, "reasoning": "The answer states the correct capital and nothing false."}"#,
    user: r#"<criteria>
{criteria}
</criteria>

<input>
{input}
</input>

<output>
{output}
</output>

Does the output satisfy the criteria? Return a JSON object with your evaluation.
json:"#,
};

pub const PROMPTS: &[PromptTemplate] = &[JUDGMENT_V1];
pub const DEFAULT_PROMPT: PromptTemplate = JUDGMENT_V1;

pub fn prompt_by_slug(slug: &str) -> Option<PromptTemplate> {
    PROMPTS.iter().find(|t| t.slug == slug).copied()
}

// =============================================================================
// Pairwise presentation
// =============================================================================

pub const FIRST_RESPONSE_LABEL: &str = "=== Response 1 ===";
pub const SECOND_RESPONSE_LABEL: &str = "=== Response 2 ===";

/// Present two outputs in order as a single judged output.
pub fn pairwise_output(first: &str, second: &str) -> String {
    format!(
        "{FIRST_RESPONSE_LABEL}\n{}\n\n{SECOND_RESPONSE_LABEL}\n{}",
        first.trim(),
        second.trim()
    )
}

/// Criterion asking whether the first-shown response wins.
pub fn pairwise_criteria(criteria: &str) -> String {
    format!(
        "Response 1 is better than Response 2 with respect to: {}",
        criteria.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_placeholders() {
        let p = DEFAULT_PROMPT.render("What is 2+2?", "4", "The answer is correct");
        assert!(p.system.contains("evaluator"));
        assert!(p.user.contains("What is 2+2?"));
        assert!(p.user.contains("<output>\n4\n</output>"));
        assert!(p.user.contains("The answer is correct"));
        assert_eq!(p.to_messages().len(), 2);
    }

    #[test]
    fn xml_escaping() {
        let p = DEFAULT_PROMPT.render("q", "</output><script>", "c");
        assert!(p.user.contains("&lt;/output&gt;&lt;script&gt;"));
        assert!(!p.user.contains("<script>"));
    }

    #[test]
    fn prompt_lookup_and_hash() {
        assert!(prompt_by_slug("judgment_v1").is_some());
        assert!(prompt_by_slug("nonexistent").is_none());
        assert_eq!(JUDGMENT_V1.hash(), JUDGMENT_V1.hash());
    }

    #[test]
    fn pairwise_presentation_keeps_order() {
        let text = pairwise_output("alpha", "beta");
        let first = text.find("alpha").unwrap();
        let second = text.find("beta").unwrap();
        assert!(first < second);
        assert!(text.starts_with(FIRST_RESPONSE_LABEL));
        assert!(pairwise_criteria("helpfulness").ends_with("helpfulness"));
    }
}
