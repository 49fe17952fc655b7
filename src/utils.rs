// src/utils.rs

/// Filename-safe form of a display name: whitespace becomes `_`, punctuation is dropped
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c.is_alphanumeric() || c == '-' {
            out.push(c);
        } else if (c.is_whitespace() || c == '_') && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Lowercase and trim an email for lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Parse a boolean query flag (`1`, `true`, `yes`, `on`)
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Value for a `Content-Disposition: attachment` header
pub fn attachment_header(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', ""))
}
