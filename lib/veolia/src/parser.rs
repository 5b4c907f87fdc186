use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ParseError;
use crate::model::{Reading, YearMonth};

pub(crate) const FORMAT_DATE: &str = "%Y-%m-%d";

const ENVELOPE_MARKER: &str = "soap:Envelope";

/// Cuts the envelope out of a response body that may carry extra data around
/// it and rebuilds a minimal well-formed document.
pub(crate) fn recover_envelope(raw: &str) -> Result<String, ParseError> {
    let mut parts = raw.splitn(3, ENVELOPE_MARKER);
    parts.next();
    let inner = parts.next().ok_or(ParseError::EnvelopeNotFound)?;
    Ok(format!("<{ENVELOPE_MARKER}{inner}{ENVELOPE_MARKER}>"))
}

/// Checks that the response carries a parseable envelope, extracting nothing.
pub(crate) fn check_envelope(raw: &str) -> Result<(), ParseError> {
    #[derive(Deserialize)]
    struct AnyEnvelope {}

    let xml = recover_envelope(raw)?;
    quick_xml::de::from_str::<AnyEnvelope>(&xml)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FaultEnvelope {
    #[serde(rename = "soap:Body")]
    body: FaultBody,
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    #[serde(rename = "soap:Fault")]
    fault: Fault,
}

#[derive(Debug, Deserialize)]
struct Fault {
    faultstring: String,
}

/// Best-effort fault message of a non-200 response: `Body/Fault/faultstring`
/// when present, the raw body otherwise.
pub(crate) fn fault_message(raw: &str) -> String {
    recover_envelope(raw)
        .ok()
        .and_then(|xml| quick_xml::de::from_str::<FaultEnvelope>(&xml).ok())
        .map(|envelope| envelope.body.fault.faultstring)
        .unwrap_or_else(|| raw.to_string())
}

// The service collapses one-element record lists into a bare element; the
// repeated-element `Vec` fields below absorb both shapes.

#[derive(Debug, Deserialize)]
struct DailyEnvelope {
    #[serde(rename = "soap:Body")]
    body: DailyBody,
}

#[derive(Debug, Deserialize)]
struct DailyBody {
    #[serde(rename = "ns2:getConsommationJournaliereResponse")]
    response: DailyResponse,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "return")]
    records: Vec<DailyRecord>,
}

#[derive(Debug, Deserialize)]
struct DailyRecord {
    #[serde(rename = "dateReleve")]
    date_releve: String,
    consommation: i64,
    index: i64,
}

/// Daily history sorted most recent first, plus the derived last index
/// (meter index + consumption of the most recent record).
pub(crate) fn parse_daily(raw: &str) -> Result<(Vec<Reading<NaiveDate>>, i64), ParseError> {
    let xml = recover_envelope(raw)?;
    let envelope: DailyEnvelope = quick_xml::de::from_str(&xml)?;

    let mut rows = Vec::new();
    for record in envelope.body.response.records {
        let date = NaiveDate::parse_from_str(&record.date_releve, FORMAT_DATE)?;
        rows.push((date, record.consommation, record.index));
    }
    rows.sort_by(|a, b| b.0.cmp(&a.0));

    let &(_, consommation, index) = rows.first().ok_or(ParseError::MissingField("return"))?;
    let last_index = index + consommation;

    let history = rows
        .iter()
        .map(|&(date, volume, _)| Reading {
            period: date,
            volume,
        })
        .collect();

    Ok((history, last_index))
}

#[derive(Debug, Deserialize)]
struct MonthlyEnvelope {
    #[serde(rename = "soap:Body")]
    body: MonthlyBody,
}

#[derive(Debug, Deserialize)]
struct MonthlyBody {
    #[serde(rename = "ns2:getConsommationMensuelleResponse")]
    response: MonthlyResponse,
}

#[derive(Debug, Deserialize)]
struct MonthlyResponse {
    #[serde(rename = "return")]
    records: Vec<MonthlyRecord>,
}

#[derive(Debug, Deserialize)]
struct MonthlyRecord {
    annee: String,
    mois: String,
    consommation: i64,
}

/// Monthly history sorted most recent first, keyed `"{annee}-{mois}"`.
pub(crate) fn parse_monthly(raw: &str) -> Result<Vec<Reading<YearMonth>>, ParseError> {
    let xml = recover_envelope(raw)?;
    let envelope: MonthlyEnvelope = quick_xml::de::from_str(&xml)?;

    let mut records = envelope.body.response.records;
    records.sort_by(|a, b| (&b.annee, &b.mois).cmp(&(&a.annee, &a.mois)));

    Ok(records
        .into_iter()
        .map(|record| Reading {
            period: YearMonth(format!("{}-{}", record.annee, record.mois)),
            volume: record.consommation,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    #[serde(rename = "soap:Body")]
    body: AuthBody,
}

#[derive(Debug, Deserialize)]
struct AuthBody {
    #[serde(rename = "ns2:getAuthentificationFrontResponse")]
    response: AuthResponse,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(rename = "return")]
    ret: AuthReturn,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthReturn {
    #[serde(rename = "espaceClient")]
    pub espace_client: EspaceClient,
    #[serde(rename = "listContrats", default)]
    pub contrats: Vec<Contrat>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EspaceClient {
    #[serde(rename = "cptPwd")]
    pub cpt_pwd: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Contrat {
    #[serde(rename = "aboId")]
    pub abo_id: String,
}

/// Token and contract list of an authentication response.
pub(crate) fn parse_auth(raw: &str) -> Result<AuthReturn, ParseError> {
    let xml = recover_envelope(raw)?;
    let envelope: AuthEnvelope = quick_xml::de::from_str(&xml)?;
    Ok(envelope.body.response.ret)
}
