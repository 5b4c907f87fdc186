use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;

use crate::auth;
use crate::config::VeoliaConfig;
use crate::envelope::{AccountToken, EnvelopeBuilder};
use crate::error::{Error, Result};
use crate::model::{ConsumptionState, Period, PeriodSeries, Reading, RefreshOutcome, YearMonth};
use crate::parser;
use crate::transport::Session;

/// Authentication state of a client. A fetch failure never moves the state
/// back; only [`VeoliaClient::reauthenticate`] discards a cached token.
#[derive(Debug, Clone)]
enum TokenState {
    Unauthenticated,
    Authenticated { token: String, abo_id: String },
}

/// Client for the water-consumption web service.
///
/// All operations take `&mut self`, so one refresh cycle runs at a time per
/// client instance.
pub struct VeoliaClient {
    config: VeoliaConfig,
    envelope: EnvelopeBuilder,
    session: Option<Session>,
    token: TokenState,
    state: ConsumptionState,
    success: bool,
}

impl VeoliaClient {
    pub fn new(config: VeoliaConfig) -> Result<Self> {
        let session = Session::new(config.endpoint())?;
        Ok(Self::assemble(config, session))
    }

    /// Builds the client around a caller-provided HTTP client.
    pub fn new_with_client(config: VeoliaConfig, client: ClientWithMiddleware) -> Self {
        let session = Session::with_client(config.endpoint(), client);
        Self::assemble(config, session)
    }

    fn assemble(config: VeoliaConfig, session: Session) -> Self {
        Self {
            config,
            envelope: EnvelopeBuilder::new(),
            session: Some(session),
            token: TokenState::Unauthenticated,
            state: ConsumptionState::default(),
            success: false,
        }
    }

    /// Checks the credentials against the service without touching any state.
    pub async fn login(&mut self) -> Result<()> {
        tracing::info!("Checking credentials");
        let session = self.session.as_ref().ok_or(Error::SessionClosed)?;
        auth::check_credentials(
            session,
            &self.envelope,
            &self.config.email,
            &self.config.password,
        )
        .await
        .map_err(|e| {
            tracing::error!("Wrong authentication: {e}");
            Error::BadCredentials(Box::new(e))
        })
    }

    async fn ensure_authenticated(&mut self) -> Result<(String, String)> {
        if let TokenState::Authenticated { token, abo_id } = &self.token {
            return Ok((token.clone(), abo_id.clone()));
        }

        let session = self.session.as_ref().ok_or(Error::SessionClosed)?;
        let issued = auth::obtain_token(
            session,
            &self.envelope,
            &self.config.email,
            &self.config.password,
            self.config.abo_id.as_deref(),
        )
        .await?;

        self.token = TokenState::Authenticated {
            token: issued.token.clone(),
            abo_id: issued.abo_id.clone(),
        };
        Ok((issued.token, issued.abo_id))
    }

    /// Discards the cached session token and authenticates again, for hosts
    /// that retry after a rejected fetch.
    pub async fn reauthenticate(&mut self) -> Result<()> {
        self.token = TokenState::Unauthenticated;
        self.ensure_authenticated().await.map(|_| ())
    }

    /// Fetches one period and replaces its slice of the result state.
    ///
    /// Authenticates first when no token is cached. Any failure leaves the
    /// previously collected data untouched.
    pub async fn update(&mut self, period: Period) -> Result<()> {
        let (token, abo_id) = self.ensure_authenticated().await?;
        let session = self.session.as_ref().ok_or(Error::SessionClosed)?;

        let operation = period.operation();
        tracing::debug!("Fetching {period} consumption with {operation}");

        let request = self.envelope.request(
            operation,
            &[("aboNum", abo_id.as_str())],
            Some(AccountToken {
                email: &self.config.email,
                token: &token,
            }),
        );

        let (status, text) = session.post(request).await?;
        if status != StatusCode::OK {
            let message = parser::fault_message(&text);
            tracing::error!("Error {status} fetching data: {message}");
            return Err(Error::RemoteService { status, message });
        }

        match period {
            Period::Daily => {
                let (history, last_index) = parser::parse_daily(&text)?;
                self.state.daily = PeriodSeries { history };
                self.state.last_index = Some(last_index);
            }
            Period::Monthly => {
                let history = parser::parse_monthly(&text)?;
                self.state.monthly = PeriodSeries { history };
            }
        }
        self.success = true;
        Ok(())
    }

    /// Fetches the daily series and returns the refreshed slice.
    pub async fn update_daily(&mut self) -> Result<&[Reading<NaiveDate>]> {
        self.update(Period::Daily).await?;
        Ok(&self.state.daily.history)
    }

    /// Fetches the monthly series and returns the refreshed slice.
    pub async fn update_monthly(&mut self) -> Result<&[Reading<YearMonth>]> {
        self.update(Period::Monthly).await?;
        Ok(&self.state.monthly.history)
    }

    /// Refreshes both periods. A failure in one never blocks the other; both
    /// outcomes are reported.
    pub async fn update_all(&mut self) -> RefreshOutcome {
        let daily = self.update(Period::Daily).await;
        let monthly = self.update(Period::Monthly).await;
        RefreshOutcome { daily, monthly }
    }

    /// Latest collected data.
    pub fn attributes(&self) -> &ConsumptionState {
        &self.state
    }

    /// Whether any fetch has succeeded over the client's lifetime.
    pub fn has_refreshed(&self) -> bool {
        self.success
    }

    /// Closes the HTTP session. Every call afterwards fails with
    /// [`Error::SessionClosed`].
    pub fn close_session(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server, ServerGuard};

    use super::*;

    const AUTH_RESPONSE: &str = concat!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>"#,
        r#"<ns2:getAuthentificationFrontResponse xmlns:ns2="http://ws.icl.veolia.com/">"#,
        "<return>",
        "<espaceClient><cptPwd>tok-123</cptPwd></espaceClient>",
        "<listContrats><aboId>abo-1</aboId></listContrats>",
        "</return>",
        "</ns2:getAuthentificationFrontResponse>",
        "</soap:Body></soap:Envelope>",
    );

    const DAILY_RESPONSE: &str = concat!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>"#,
        r#"<ns2:getConsommationJournaliereResponse xmlns:ns2="http://ws.icl.veolia.com/">"#,
        "<return><dateReleve>2024-01-01</dateReleve><consommation>3</consommation><index>95</index></return>",
        "<return><dateReleve>2024-01-02</dateReleve><consommation>5</consommation><index>100</index></return>",
        "</ns2:getConsommationJournaliereResponse>",
        "</soap:Body></soap:Envelope>",
    );

    const MONTHLY_RESPONSE: &str = concat!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>"#,
        r#"<ns2:getConsommationMensuelleResponse xmlns:ns2="http://ws.icl.veolia.com/">"#,
        "<return><annee>2024</annee><mois>03</mois><consommation>40</consommation></return>",
        "</ns2:getConsommationMensuelleResponse>",
        "</soap:Body></soap:Envelope>",
    );

    const FAULT_RESPONSE: &str = concat!(
        r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>"#,
        "<soap:Fault><faultcode>soap:Server</faultcode><faultstring>Maintenance en cours</faultstring></soap:Fault>",
        "</soap:Body></soap:Envelope>",
    );

    fn client(server: &ServerGuard, abo_id: Option<&str>) -> VeoliaClient {
        VeoliaClient::new(VeoliaConfig {
            email: "me@example.com".to_string(),
            password: "secret".to_string(),
            abo_id: abo_id.map(str::to_string),
            url: Some(server.url()),
        })
        .unwrap()
    }

    fn body_contains(needle: &str) -> Matcher {
        Matcher::Regex(needle.to_string())
    }

    #[tokio::test]
    async fn update_daily_authenticates_then_fetches() {
        let mut server = Server::new_async().await;

        let auth = server
            .mock("POST", "/")
            .match_header("Content-Type", "application/xml; charset=UTF-8")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .expect(1)
            .create_async()
            .await;

        let daily = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                body_contains("getConsommationJournaliere"),
                body_contains("<aboNum>abo-1</aboNum>"),
                body_contains(">tok-123</wsse:Password>"),
                body_contains("<wsse:Username>me@example.com</wsse:Username>"),
            ]))
            .with_status(200)
            .with_body(DAILY_RESPONSE)
            .expect(1)
            .create_async()
            .await;

        let mut client = client(&server, None);
        let history = client.update_daily().await.unwrap().to_vec();

        assert_eq!(history.len(), 2);
        assert_eq!(
            history[0],
            Reading {
                period: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                volume: 5
            }
        );
        assert_eq!(client.attributes().last_index, Some(105));
        assert!(client.has_refreshed());

        auth.assert_async().await;
        daily.assert_async().await;
    }

    #[tokio::test]
    async fn token_is_cached_across_updates() {
        let mut server = Server::new_async().await;

        let auth = server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .expect(1)
            .create_async()
            .await;

        let daily = server
            .mock("POST", "/")
            .match_body(body_contains("getConsommationJournaliere"))
            .with_status(200)
            .with_body(DAILY_RESPONSE)
            .expect(2)
            .create_async()
            .await;

        let mut client = client(&server, None);
        client.update(Period::Daily).await.unwrap();
        client.update(Period::Daily).await.unwrap();

        auth.assert_async().await;
        daily.assert_async().await;
    }

    #[tokio::test]
    async fn configured_abo_id_skips_contract_resolution() {
        let mut server = Server::new_async().await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .create_async()
            .await;

        let monthly = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                body_contains("getConsommationMensuelle"),
                body_contains("<aboNum>custom-abo</aboNum>"),
            ]))
            .with_status(200)
            .with_body(MONTHLY_RESPONSE)
            .create_async()
            .await;

        let mut client = client(&server, Some("custom-abo"));
        let history = client.update_monthly().await.unwrap();

        assert_eq!(history[0].period, YearMonth("2024-03".to_string()));
        assert_eq!(history[0].volume, 40);
        monthly.assert_async().await;
    }

    #[tokio::test]
    async fn update_all_isolates_a_monthly_failure() {
        let mut server = Server::new_async().await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .create_async()
            .await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getConsommationJournaliere"))
            .with_status(200)
            .with_body(DAILY_RESPONSE)
            .create_async()
            .await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getConsommationMensuelle"))
            .with_status(500)
            .with_body(FAULT_RESPONSE)
            .create_async()
            .await;

        let mut client = client(&server, None);
        let outcome = client.update_all().await;

        assert!(outcome.daily.is_ok());
        assert!(!outcome.all_ok());
        match outcome.monthly {
            Err(Error::RemoteService { status, message }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(message, "Maintenance en cours");
            }
            other => panic!("unexpected monthly outcome: {other:?}"),
        }

        assert_eq!(client.attributes().daily.history.len(), 2);
        assert!(client.attributes().monthly.history.is_empty());
        assert!(client.has_refreshed());
    }

    #[tokio::test]
    async fn remote_fault_without_faultstring_reports_the_raw_body() {
        let mut server = Server::new_async().await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .create_async()
            .await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getConsommationJournaliere"))
            .with_status(502)
            .with_body("<html>502 Bad Gateway</html>")
            .create_async()
            .await;

        let mut client = client(&server, None);
        let err = client.update(Period::Daily).await.unwrap_err();

        match err {
            Error::RemoteService { status, message } => {
                assert_eq!(status.as_u16(), 502);
                assert_eq!(message, "<html>502 Bad Gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_accepts_valid_credentials() {
        let mut server = Server::new_async().await;

        let auth = server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .create_async()
            .await;

        let mut client = client(&server, None);
        client.login().await.unwrap();

        auth.assert_async().await;
    }

    #[tokio::test]
    async fn login_rejection_is_reported_as_bad_credentials() {
        let mut server = Server::new_async().await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(500)
            .with_body(FAULT_RESPONSE)
            .create_async()
            .await;

        let mut client = client(&server, None);
        let err = client.login().await.unwrap_err();

        assert!(matches!(err, Error::BadCredentials(_)));
    }

    #[tokio::test]
    async fn closed_session_rejects_every_call() {
        let server = Server::new_async().await;

        let mut client = client(&server, None);
        client.close_session();

        assert!(matches!(
            client.update(Period::Daily).await,
            Err(Error::SessionClosed)
        ));
        assert!(matches!(client.login().await, Err(Error::SessionClosed)));
        assert!(matches!(
            client.reauthenticate().await,
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn parse_failure_leaves_previous_state_untouched() {
        let mut server = Server::new_async().await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getAuthentificationFront"))
            .with_status(200)
            .with_body(AUTH_RESPONSE)
            .create_async()
            .await;

        let good = server
            .mock("POST", "/")
            .match_body(body_contains("getConsommationJournaliere"))
            .with_status(200)
            .with_body(DAILY_RESPONSE)
            .expect(1)
            .create_async()
            .await;

        let mut client = client(&server, None);
        client.update(Period::Daily).await.unwrap();
        good.remove_async().await;

        server
            .mock("POST", "/")
            .match_body(body_contains("getConsommationJournaliere"))
            .with_status(200)
            .with_body("no envelope here")
            .create_async()
            .await;

        let err = client.update(Period::Daily).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(client.attributes().daily.history.len(), 2);
        assert_eq!(client.attributes().last_index, Some(105));
    }
}
