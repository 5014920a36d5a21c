// src/llm/extract.rs
// Tolerant extraction of a JSON object from free-form model output.

/// Returns the substring from the first `{` to the last `}` in `raw`.
///
/// Models routinely wrap the requested JSON in explanatory prose
/// ("Sure! Here you go: {...} Hope that helps."). If no enclosing pair
/// exists the input is returned unchanged so the downstream parse fails
/// explicitly instead of silently succeeding on partial data.
pub fn extract_json_object(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    }
}

/// Heuristic for output cut short by the token budget: an opening brace
/// exists but the (trimmed) text does not end with a closing one.
///
/// Can false-positive on complete-looking but still-invalid payloads, so
/// the client treats it as overridable rather than definitive.
pub fn looks_truncated(raw: &str) -> bool {
    raw.contains('{') && !raw.trim_end().ends_with('}')
}
