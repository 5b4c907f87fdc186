pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the client.
///
/// Everything propagates to the caller of `login`/`update`; the only place a
/// failure is caught is `update_all`, which isolates one per period.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error sending request to the service")]
    Transport(#[from] reqwest_middleware::Error),
    #[error("error reading response from the service")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("wrong authentication: {0}")]
    BadCredentials(#[source] Box<Error>),
    #[error("error {status} fetching data: {message}")]
    RemoteService {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("issue with accessing data")]
    Parse(#[from] ParseError),
    #[error("session already closed")]
    SessionClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no soap envelope in response")]
    EnvelopeNotFound,
    #[error("error decoding response xml")]
    Xml(#[from] quick_xml::DeError),
    #[error("error parsing reading date")]
    Date(#[from] chrono::ParseError),
    #[error("missing {0} in response")]
    MissingField(&'static str),
}
