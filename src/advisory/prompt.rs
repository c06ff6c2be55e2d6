//! Prompt construction for the reasoning service

use serde::Deserialize;

use crate::reading::Reading;

const SYSTEM_PROMPT: &str = "You are an agronomist supervising a greenhouse. \
Readings come from field sensors: temperature in °C, relative humidity in %, and light in lux. \
Be practical and concise.";

const MOBILE_SUFFIX: &str =
    "Reply in at most two short sentences; the answer is shown on a phone.";

/// Smallest response budget ever requested
const MIN_MAX_TOKENS: u32 = 32;

/// Who will read the answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    Dashboard,
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Diagnosis plus one recommended action
    Report,

    /// Answer an operator question
    Chat,
}

/// A fully built request for the reasoning service
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub mode: PromptMode,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

impl Prompt {
    /// Build a prompt from the latest reading
    ///
    /// A present, non-blank `question` selects chat mode; otherwise the
    /// prompt asks for a report.
    pub fn build(
        context: &Reading,
        question: Option<&str>,
        audience: Audience,
        max_tokens: u32,
    ) -> Self {
        let readings = format!(
            "temperature {} °C, humidity {} %, light {} lx",
            channel(context.t),
            channel(context.h),
            channel(context.l)
        );

        let question = question.map(str::trim).filter(|q| !q.is_empty());

        let (mode, mut user) = match question {
            None => (
                PromptMode::Report,
                format!(
                    "Current readings: {readings}.\n\
                     Give a brief diagnosis of the growing conditions and exactly one recommended action."
                ),
            ),
            Some(question) => (
                PromptMode::Chat,
                format!(
                    "Operator question: {question}\n\n\
                     Answer the question directly. Use the current readings only as supporting context: {readings}."
                ),
            ),
        };

        let max_tokens = match audience {
            Audience::Dashboard => max_tokens,
            Audience::Mobile => {
                user.push('\n');
                user.push_str(MOBILE_SUFFIX);
                max_tokens / 2
            }
        };

        Self {
            mode,
            system: SYSTEM_PROMPT.to_string(),
            user,
            max_tokens: max_tokens.max(MIN_MAX_TOKENS),
        }
    }
}

fn channel(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}
