//! Prompt templates for rubric-based pairwise judging.
//!
//! Domain logic for rendering comparison prompts. Provider-agnostic.

use crate::gateway::Message;
use crate::tournament::{Candidate, Rubric};

// =============================================================================
// Prompt templates
// =============================================================================

/// Rendered prompt ready for LLM.
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

    /// blake3 over system + user, for trace correlation.
    pub fn content_hash(&self) -> String {
        blake3::hash(format!("{}\n{}", self.system, self.user).as_bytes())
            .to_hex()
            .to_string()
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

/// A prompt template with placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Render a comparison of `first` against `second`. Scores are requested
    /// for `first` only.
    pub fn render(
        &self,
        user_input: &str,
        rubric: &Rubric,
        first: &Candidate,
        second: &Candidate,
    ) -> PromptInstance {
        let dimension_ids = rubric
            .dimensions()
            .iter()
            .map(|d| format!("\"{}\"", escape_xml_chars(&d.id)))
            .collect::<Vec<_>>()
            .join(", ");

        let system = fill(
            self.system,
            &[
                ("rubric_name", escape_xml_chars(rubric.name()).as_str()),
                ("dimension_ids", dimension_ids.as_str()),
            ],
        );

        let user = fill(
            self.user,
            &[
                ("user_input", escape_xml_chars(user_input.trim()).as_str()),
                ("rubric_description", escape_xml_chars(rubric.description()).as_str()),
                ("dimensions", render_dimensions(rubric).as_str()),
                ("first", render_candidate(first).as_str()),
                ("second", render_candidate(second).as_str()),
            ],
        );

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }
}

/// Substitute `{key}` placeholders in a single left-to-right pass. Inserted
/// values are never rescanned, so caller text cannot expand placeholders.
/// Braces that do not name a key are copied through.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match hit {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_dimensions(rubric: &Rubric) -> String {
    rubric
        .dimensions()
        .iter()
        .map(|d| {
            format!(
                "<dimension id=\"{}\" weight=\"{:.2}\">\n{}: {}\n</dimension>",
                escape_xml_chars(&d.id),
                d.weight,
                escape_xml_chars(&d.name),
                escape_xml_chars(&d.scoring_criteria)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_candidate(c: &Candidate) -> String {
    let mut parts = vec![format!("<name>{}</name>", escape_xml_chars(&c.name))];
    if !c.description.trim().is_empty() {
        parts.push(format!(
            "<description>{}</description>",
            escape_xml_chars(c.description.trim())
        ));
    }
    if !c.metadata.is_empty() {
        // BTreeMap keeps keys ordered so the rendered prompt is stable.
        let meta = serde_json::to_string(&c.metadata).unwrap_or_default();
        parts.push(format!("<metadata>{}</metadata>", escape_xml_chars(&meta)));
    }
    parts.join("\n")
}

// =============================================================================
// Standard prompts
// =============================================================================

pub const PAIRWISE_RUBRIC_PROMPT: PromptTemplate = PromptTemplate {
    slug: "pairwise_rubric_v1",
    system: r#"You are an impartial judge resolving an ambiguous request. You are shown the user's input, a scoring rubric ({rubric_name}), and two candidates labelled FIRST and SECOND. For every rubric dimension, score how much better FIRST fits the user's input than SECOND: 1.0 means FIRST is clearly better, 0.0 means SECOND is clearly better, 0.5 means they are equal. Judge the content, not the order in which the candidates appear.

Output only valid JSON with a score in [0, 1] for each of these dimension ids: {dimension_ids}, plus a short reasoning string.
Example:
{"scores": {"<dimension_id>": 0.7}, "reasoning": "FIRST covers the destination parameter; SECOND does not."}"#,
    user: r#"<user_input>
{user_input}
</user_input>

<rubric>
{rubric_description}
{dimensions}
</rubric>

<candidate_FIRST>
{first}
</candidate_FIRST>

<candidate_SECOND>
{second}
</candidate_SECOND>

Return a JSON object with your evaluation.
json:"#,
};

pub const PROMPTS: &[PromptTemplate] = &[PAIRWISE_RUBRIC_PROMPT];
pub const DEFAULT_PROMPT: PromptTemplate = PAIRWISE_RUBRIC_PROMPT;

pub fn prompt_by_slug(slug: &str) -> Option<PromptTemplate> {
    PROMPTS.iter().find(|t| t.slug == slug).copied()
}

// =============================================================================
// TESTS
// =============================================================================
