//! Endpoint URL helpers.
//!
//! Base URLs come from the config file or the environment and may carry
//! trailing slashes; endpoints are joined without producing `//`.

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const CHAT_COMPLETIONS_PATH: &str = "chat/completions";
pub const MODELS_PATH: &str = "models";
pub const BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";

/// Join a base URL and an endpoint path.
///
/// # Examples
///
/// ```
/// use routechat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://openrouter.ai/api/v1/", "/models"),
///     "https://openrouter.ai/api/v1/models"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

/// Pick the API base: environment first, then config, then the public
/// OpenRouter endpoint. Blank values are ignored.
pub fn resolve_base_url(env_value: Option<String>, configured: Option<&str>) -> String {
    fn usable(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|value| !value.is_empty())
    }

    usable(env_value.as_deref())
        .or_else(|| usable(configured))
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}
