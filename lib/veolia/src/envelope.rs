use chrono::Utc;
use quick_xml::escape::escape;

// The service accepts a fixed anonymous UsernameToken; only Created varies,
// and it is captured once per client, not per request.
const ANONYMOUS_USERNAME: &str = "anonyme";
const ANONYMOUS_PASSWORD: &str = "PYg6fMplCoo19dZVXkn2";
const ANONYMOUS_NONCE: &str = "1dWl+HzD/sJsWzAcDHQX6Q==";

const NS_SERVICE: &str = "http://ws.icl.veolia.com/";

/// Account credentials injected into the WS-Security header of a request
/// that runs after authentication.
pub(crate) struct AccountToken<'a> {
    pub email: &'a str,
    pub token: &'a str,
}

/// Renders WS-Security SOAP 1.1 request envelopes.
///
/// Every call produces a fresh document, so requests can never leak header
/// or body state into each other.
pub(crate) struct EnvelopeBuilder {
    created: String,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self {
            created: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        }
    }

    /// Serialized envelope for one operation, parameters in slice order.
    pub fn request(
        &self,
        operation: &str,
        params: &[(&str, &str)],
        account: Option<AccountToken<'_>>,
    ) -> String {
        let (username, password) = match &account {
            Some(account) => (account.email, account.token),
            None => (ANONYMOUS_USERNAME, ANONYMOUS_PASSWORD),
        };

        let mut body = String::new();
        for (name, value) in params {
            body.push_str(&format!("<{name}>{}</{name}>", escape(*value)));
        }

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
                "<soap:Header>",
                r#"<wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">"#,
                r#"<wsse:UsernameToken xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd" wsu:Id="UsernameToken-aiehdbsf52">"#,
                "<wsse:Username>{username}</wsse:Username>",
                r#"<wsse:Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText">{password}</wsse:Password>"#,
                r#"<wsse:Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{nonce}</wsse:Nonce>"#,
                "<wsse:Created>{created}</wsse:Created>",
                "</wsse:UsernameToken>",
                "</wsse:Security>",
                "</soap:Header>",
                "<soap:Body>",
                r#"<ns2:{operation} xmlns:ns2="{ns}">{body}</ns2:{operation}>"#,
                "</soap:Body>",
                "</soap:Envelope>",
            ),
            username = escape(username),
            password = escape(password),
            nonce = ANONYMOUS_NONCE,
            created = self.created,
            operation = operation,
            ns = NS_SERVICE,
            body = body,
        )
    }
}
