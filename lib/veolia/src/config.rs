use serde::Deserialize;

/// Production endpoint of the subscriber web service.
pub const DEFAULT_ENDPOINT: &str = "https://www.service.eau.veolia.fr/icl-ws/iclWebService";

#[derive(Debug, Clone, Deserialize)]
pub struct VeoliaConfig {
    pub email: String,
    pub password: String,
    /// Contract identifier. Resolved from the authentication response when absent.
    #[serde(default)]
    pub abo_id: Option<String>,
    /// Endpoint override, the production URL when absent.
    #[serde(default)]
    pub url: Option<String>,
}

impl VeoliaConfig {
    pub(crate) fn endpoint(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }
}
