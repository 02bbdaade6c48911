//! Context enrichment.
//!
//! Folds the non-empty patient context fields into the outgoing message as a
//! bracketed block. Pure: no I/O, output depends only on the inputs.

use parley_core::PatientContext;

const FIELD_SEPARATOR: &str = " | ";

/// Prefix the message with a `[Context: ...]` block.
///
/// Returns the message unchanged when every context field is empty. Fields
/// appear in declaration order as `Label: value`.
pub fn enrich(message: &str, context: &PatientContext) -> String {
    let entries = context.entries();
    if entries.is_empty() {
        return message.to_string();
    }

    let joined = entries
        .iter()
        .map(|(field, value)| format!("{}: {}", field.label(), value))
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR);

    format!("[Context: {}]\n\n{}", joined, message)
}
