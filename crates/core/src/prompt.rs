//! Prompt construction.
//!
//! The instruction prompt is fixed for the lifetime of the binary; only the user content varies,
//! and it is a plain template substitution of the three visit fields.

use crate::constants::DEFAULT_MAX_COMPLETION_TOKENS;
use crate::visit::VisitRequest;

/// Fixed clinical-summarisation instructions sent as the system message of every request.
pub const SYSTEM_PROMPT: &str = r#"
You are provided with clinical notes from a doctor documenting a patient's visit.
Your job is to generate a structured, clinically useful summary for the doctor and draft a clear, patient-friendly email for follow-up.
Respond with these three sections, using exactly the specified headings:

### Summary of Visit for the Doctor's Records
Include: patient’s initials (or a safe identifier), age, and date of visit. Summarize the main complaints, history (medical, surgical, social), examination findings, diagnoses or issues addressed, treatments or procedures performed, medication changes, results reviewed, and notable discussion points (including informed consent or preferences). Flag important safety information or clinical “red flags.” Use bullet points for clarity. Note any references to relevant attachments or linked external documents.

### Next Steps for the Doctor
List specific actions including pending tests, referrals, medication adjustments, monitoring/support instructions, and reminders (e.g. review labs, arrange specialist consult). Clearly state the timing for follow-up and any red-flag alerts requiring urgent attention. Include care coordination (e.g., communication between providers) and, if applicable, instructions relevant to remote or telehealth consultations.

### Draft of Email to Patient in Patient-Friendly Language
Summarize the visit in clear, easy-to-understand language with date and provider details. Explain findings, diagnoses, what they mean, and next steps with timelines (e.g., when to book follow-up, what to do if symptoms worsen). Include actionable instructions, warning signs, and how to reach out for help or clarification. Make the language accessible for all literacy levels and encourage questions. Mention if translation or accessibility support is available. Do not include unnecessary sensitive information.

**Additional requirements:**
- Avoid copying verbatim from original notes in any section.
- Respect privacy and clinical compliance (use minimal identifiers only as needed).
- Tailor all content contextually to the provided notes and the specifics of the visit.
- Note at the end if attachments or external reports are referenced or available.
"#;

/// Headings the model is asked to produce, in order.
pub const SECTION_HEADINGS: [&str; 3] = [
    "### Summary of Visit for the Doctor's Records",
    "### Next Steps for the Doctor",
    "### Draft of Email to Patient in Patient-Friendly Language",
];

/// System instructions plus the per-visit user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system_instructions: &'static str,
    pub user_content: String,
}

impl PromptPair {
    /// Build the prompt pair for a visit. Field values are interpolated verbatim.
    pub fn for_visit(visit: &VisitRequest) -> Self {
        Self {
            system_instructions: SYSTEM_PROMPT,
            user_content: user_prompt_for(visit),
        }
    }
}

fn user_prompt_for(visit: &VisitRequest) -> String {
    format!(
        "Create the summary, next steps and draft email for:\n\
         Patient Name: {}\n\
         Date of Visit: {}\n\
         Notes:\n\
         {}",
        visit.patient_name, visit.date_of_visit, visit.notes
    )
}

/// Parameters of one upstream generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Deployment name; Azure routes on it, and it is also sent as the model field.
    pub model: String,
    pub max_completion_tokens: u32,
    pub stream: bool,
}

impl GenerationParams {
    pub fn for_deployment(deployment: impl Into<String>) -> Self {
        Self {
            model: deployment.into(),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            stream: true,
        }
    }
}
