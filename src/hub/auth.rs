//! Hub bearer token discovery
//!
//! Checks in order:
//! 1. `$HF_TOKEN`
//! 2. `$HUGGING_FACE_HUB_TOKEN`
//! 3. The token file written by `huggingface-cli login` (`$HF_HOME/token`)
//!
//! Running without a token is allowed; public repositories still resolve.

/// Where a token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    HfTokenEnv,
    HubTokenEnv,
    HfCache,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HfTokenEnv => write!(f, "HF_TOKEN"),
            Self::HubTokenEnv => write!(f, "HUGGING_FACE_HUB_TOKEN"),
            Self::HfCache => write!(f, "hf_cache"),
        }
    }
}

/// A bearer token for the Hub; `Debug` never prints the secret
#[derive(Clone, PartialEq, Eq)]
pub struct HubToken {
    value: String,
    source: TokenSource,
}

impl std::fmt::Debug for HubToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubToken")
            .field("value", &self.masked())
            .field("source", &self.source)
            .finish()
    }
}

impl HubToken {
    pub fn new(value: impl Into<String>, source: TokenSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    /// Resolve a token from the environment and the local HF cache
    pub fn resolve() -> Option<Self> {
        Self::resolve_with(
            |name| std::env::var(name).ok(),
            || hf_hub::Cache::default().token(),
        )
    }

    /// Resolution with injectable lookups
    pub fn resolve_with(
        env: impl Fn(&str) -> Option<String>,
        cache_token: impl FnOnce() -> Option<String>,
    ) -> Option<Self> {
        let candidates = [
            ("HF_TOKEN", TokenSource::HfTokenEnv),
            ("HUGGING_FACE_HUB_TOKEN", TokenSource::HubTokenEnv),
        ];

        for (var, source) in candidates {
            if let Some(token) = env(var).and_then(non_blank) {
                return Some(Self::new(token, source));
            }
        }

        cache_token()
            .and_then(non_blank)
            .map(|token| Self::new(token, TokenSource::HfCache))
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }

    /// The secret itself, for the Authorization header only
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Printable form, e.g. `hf_Op…wM`
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        if chars.len() <= 12 {
            return "****".to_string();
        }
        let head: String = chars[..5].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

fn non_blank(token: String) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
