//! Authentication headers for outbound API requests.

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// The stored key wins; `OPENROUTER_API_KEY` is the fallback. Blank values
/// count as absent.
pub fn resolve_credential(stored: &str, env_value: Option<String>) -> Option<String> {
    let stored = stored.trim();
    if !stored.is_empty() {
        return Some(stored.to_string());
    }
    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Attach `Authorization: Bearer <credential>` when a credential is present.
///
/// The model directory is public, so callers may pass `None` (or an empty
/// string) and the request goes out unauthenticated.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    credential: Option<&str>,
) -> reqwest::RequestBuilder {
    match credential.map(str::trim).filter(|key| !key.is_empty()) {
        Some(key) => request.header("Authorization", format!("Bearer {key}")),
        None => request,
    }
}

/// Mask a credential for display, keeping its prefix and last four
/// characters.
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..9].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
