use reqwest::StatusCode;

use crate::envelope::EnvelopeBuilder;
use crate::error::{Error, Result};
use crate::parser;
use crate::transport::Session;

pub(crate) const AUTH_OPERATION: &str = "getAuthentificationFront";

/// Token and contract identifier produced by a successful authentication.
#[derive(Debug, Clone)]
pub(crate) struct SessionToken {
    pub token: String,
    pub abo_id: String,
}

async fn post_authentication(
    session: &Session,
    envelope: &EnvelopeBuilder,
    email: &str,
    password: &str,
) -> Result<String> {
    let request = envelope.request(
        AUTH_OPERATION,
        &[("cptEmail", email), ("cptPwd", password)],
        None,
    );

    tracing::debug!("Sending authentication request for {email}");
    let (status, text) = session.post(request).await?;
    if status != StatusCode::OK {
        tracing::error!("Problem with authentication");
        return Err(Error::Authentication(format!(
            "authentication request failed with status {status}"
        )));
    }
    Ok(text)
}

/// Authenticates and resolves the contract to fetch for: the configured one,
/// or the first contract the service lists.
pub(crate) async fn obtain_token(
    session: &Session,
    envelope: &EnvelopeBuilder,
    email: &str,
    password: &str,
    abo_id: Option<&str>,
) -> Result<SessionToken> {
    let text = post_authentication(session, envelope, email, password).await?;
    let ret = parser::parse_auth(&text).map_err(|e| Error::Authentication(e.to_string()))?;

    let abo_id = match abo_id {
        Some(id) => id.to_string(),
        None => {
            tracing::debug!("No abo_id configured, using the first contract");
            ret.contrats
                .first()
                .map(|contrat| contrat.abo_id.clone())
                .ok_or_else(|| {
                    Error::Authentication("no contract in authentication response".to_string())
                })?
        }
    };
    tracing::debug!("abo_id={abo_id}");

    Ok(SessionToken {
        token: ret.espace_client.cpt_pwd,
        abo_id,
    })
}

/// Validates credentials only; the response content is discarded.
pub(crate) async fn check_credentials(
    session: &Session,
    envelope: &EnvelopeBuilder,
    email: &str,
    password: &str,
) -> Result<()> {
    let text = post_authentication(session, envelope, email, password).await?;
    parser::check_envelope(&text).map_err(|e| Error::Authentication(e.to_string()))
}
