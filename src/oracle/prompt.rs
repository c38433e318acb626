//! Default instructions sent with every chunk.

use crate::processing::RiskLevel;

use super::OracleInput;

/// Categories the oracle may assign.
pub const CATEGORIES: &[&str] = &[
    "account_termination",
    "arbitration",
    "auto_renewal",
    "content_license",
    "data_collection",
    "data_sharing",
    "governing_law",
    "indemnification",
    "liability_limitation",
    "payment",
    "refunds",
    "terms_changes",
    "user_obligations",
    "warranty_disclaimer",
];

/// Render the classification prompt for one chunk.
pub fn render(input: &OracleInput) -> String {
    let risk_levels = RiskLevel::ALL
        .iter()
        .map(|level| level.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = String::from(
        "You are a legal assistant specializing in Terms & Conditions analysis. Protect the \
         interests of the user who is about to accept these terms.\n\n\
         Classify the clause below against the allowed categories and risk levels, with a focus \
         on terms that negatively impact or limit user rights.\n\n",
    );
    prompt.push_str(&format!("Clause:\n\"\"\"{}\"\"\"\n\n", input.text));

    let context = input.user_context.trim();
    if !context.is_empty() {
        prompt.push_str(&format!("User context:\n\"\"\"{context}\"\"\"\n\n"));
    }

    prompt.push_str(
        "Instructions:\n\
         - Assess the clause from the perspective of the user's interests and rights.\n\
         - Highlight language that is unfavorable, risky, or restrictive for the user.\n\
         - Do not infer meanings beyond what the clause states.\n\
         - Only assign a category if the clause directly pertains to it; otherwise return an \
         empty list.\n\
         - Set is_valid to false when the text is not a coherent clause (merged headings, \
         gibberish, navigation text).\n\n",
    );
    prompt.push_str(&format!("Allowed categories: {}\n", CATEGORIES.join(", ")));
    prompt.push_str(&format!("Allowed risk levels: {risk_levels}\n\n"));
    prompt.push_str("Be objective, concise, and prioritize user protection.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_clause_and_vocabularies() {
        let prompt = render(&OracleInput {
            text: "We may share your data with partners.".into(),
            user_context: String::new(),
        });

        assert!(prompt.contains("We may share your data with partners."));
        assert!(prompt.contains("data_sharing"));
        assert!(prompt.contains("standard_practice, low, medium, high, critical"));
        assert!(!prompt.contains("User context"));
    }

    #[test]
    fn prompt_includes_non_empty_user_context() {
        let prompt = render(&OracleInput {
            text: "Fees are non-refundable.".into(),
            user_context: "  I plan to cancel after a month  ".into(),
        });

        assert!(prompt.contains("User context:\n\"\"\"I plan to cancel after a month\"\"\""));
    }
}
