//! Medical disclaimer policy.
//!
//! Two keyword tables and substring matching, case-insensitive. A message is
//! a medical topic if it contains any [`MEDICAL_KEYWORDS`] entry; an answer
//! already carries a disclaimer if it contains any [`DISCLAIMER_MARKERS`]
//! entry. [`DISCLAIMER`] itself contains a marker, so injection is
//! idempotent.

/// Keywords that flag a user message as a medical topic.
pub const MEDICAL_KEYWORDS: &[&str] = &[
    "symptom",
    "pain",
    "headache",
    "disease",
    "medication",
    "medicine",
    "doctor",
    "diagnosis",
    "diagnose",
    "treatment",
    "prescription",
    "dosage",
    "illness",
    "fever",
    "infection",
    "allergy",
    "injury",
    "hospital",
    "health",
];

/// Substrings that mean an answer already carries a disclaimer.
pub const DISCLAIMER_MARKERS: &[&str] = &["disclaimer", "medical advice"];

/// Block appended to answers about medical topics.
pub const DISCLAIMER: &str = "⚠️ Disclaimer: This information is for general educational \
purposes only and is not a substitute for professional medical advice, diagnosis, or \
treatment. Always consult a qualified healthcare provider about your situation.";

pub fn is_medical_topic(text: &str) -> bool {
    contains_any(text, MEDICAL_KEYWORDS)
}

pub fn has_disclaimer(text: &str) -> bool {
    contains_any(text, DISCLAIMER_MARKERS)
}

/// Append [`DISCLAIMER`] unless `answer` already has one.
pub fn inject_disclaimer(answer: &str) -> String {
    if has_disclaimer(answer) {
        answer.to_string()
    } else {
        format!("{}\n\n{}", answer, DISCLAIMER)
    }
}

/// Apply the policy: inject only when `user_message` is a medical topic.
pub fn apply(user_message: &str, answer: &str) -> String {
    if is_medical_topic(user_message) {
        inject_disclaimer(answer)
    } else {
        answer.to_string()
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}
