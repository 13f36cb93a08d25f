use magpie_core::ReviewFinding;
use tracing::warn;

const SYSTEM_PROMPT: &str = "\
You are a senior software engineer performing a code review. Be thorough but \
constructive. Focus on important issues rather than style nitpicks. Always \
respond with properly formatted JSON.";

/// Build the system prompt for the reviewer model.
///
/// # Examples
///
/// ```
/// use magpie_review::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt();
/// assert!(prompt.contains("code review"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Build the per-file user prompt containing the code to review.
///
/// The output contract is spelled out in full: a strict JSON array of
/// findings with `line`, `comment`, and `suggestion` fields, or `[]` when
/// the file is clean.
///
/// # Examples
///
/// ```
/// use magpie_review::prompt::build_review_prompt;
///
/// let prompt = build_review_prompt("src/auth.rs", "fn login() {}");
/// assert!(prompt.contains("src/auth.rs"));
/// assert!(prompt.contains("fn login() {}"));
/// ```
pub fn build_review_prompt(file_path: &str, code: &str) -> String {
    format!(
        "You are reviewing one file from a pull request.\n\
         \n\
         Your task:\n\
         - Identify code issues, potential bugs, and improvements.\n\
         - Be constructive and helpful. Focus on critical or architecturally important improvements.\n\
         - Do not flag minor style issues unless they impact readability or maintainability.\n\
         - Respond in clear, actionable language.\n\
         \n\
         Review this code and respond with ONLY a JSON array of found issues. For each issue include:\n\
         - line number\n\
         - explanation of the issue\n\
         - concrete code suggestion for improvement\n\
         \n\
         Format EXACTLY like this JSON array, with no other text:\n\
         \n\
         [\n\
         \x20   {{\n\
         \x20       \"line\": 1,\n\
         \x20       \"comment\": \"Description of the issue and why it should be improved\",\n\
         \x20       \"suggestion\": \"The exact code that should replace this line\"\n\
         \x20   }}\n\
         ]\n\
         \n\
         If no issues are found, respond with an empty array: []\n\
         \n\
         The code to review is from {file_path}:\n\
         \n\
         ```\n\
         {code}\n\
         ```"
    )
}

/// Parse the reviewer's response into validated findings.
///
/// The model is told to return a bare JSON array; markdown code fences are
/// tolerated and stripped. Anything that is not a JSON array of objects
/// matching the finding schema deterministically yields an empty set —
/// a malformed response must never abort the run. Findings citing line 0
/// are dropped; file lines are 1-based.
///
/// # Examples
///
/// ```
/// use magpie_review::prompt::parse_findings;
///
/// let findings = parse_findings(r#"[{"line": 3, "comment": "shadowed variable"}]"#);
/// assert_eq!(findings.len(), 1);
///
/// assert!(parse_findings("I could not find any issues!").is_empty());
/// ```
pub fn parse_findings(response: &str) -> Vec<ReviewFinding> {
    let cleaned = strip_code_fences(response);

    let findings: Vec<ReviewFinding> = match serde_json::from_str(cleaned) {
        Ok(f) => f,
        Err(e) => {
            warn!("failed to parse reviewer response as a JSON array: {e}");
            return Vec::new();
        }
    };

    findings.into_iter().filter(|f| f.line > 0).collect()
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
