// src/normalizer.rs

/// Canonicalize a free-text skill label into a stable matching key.
///
/// Lower-cases and trims the input, then folds common spelling variations
/// into one canonical form. Empty or whitespace-only input yields an empty
/// string. Pure and idempotent.
pub fn normalize_skill_name(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    let canonical = match normalized.as_str() {
        "js" => "javascript",
        "reactjs" | "react.js" => "react",
        "nodejs" | "node.js" => "node.js",
        "html5" => "html",
        "css3" => "css",
        "mongodb" => "mongo",
        "postgresql" | "postgres" => "postgres",
        "aws" => "amazon web services",
        _ => return normalized,
    };
    canonical.to_string()
}
