use chrono::NaiveDate;
use serde::Serialize;

use crate::error;

/// Consumption series granularity offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Period {
    #[display("daily")]
    Daily,
    #[display("monthly")]
    Monthly,
}

impl Period {
    /// Remote operation implementing the fetch for this period.
    pub(crate) fn operation(self) -> &'static str {
        match self {
            Period::Daily => "getConsommationJournaliere",
            Period::Monthly => "getConsommationMensuelle",
        }
    }
}

/// Year-month period key as the service reports it, e.g. `2024-03`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, derive_more::Display, derive_more::From)]
pub struct YearMonth(pub String);

/// One consumption record: a period key and the measured volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading<K> {
    pub period: K,
    pub volume: i64,
}

/// History slice for one period, most recent first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodSeries<K> {
    pub history: Vec<Reading<K>>,
}

/// Accumulated result state of a client.
///
/// Each successful fetch replaces one period's series wholesale; a failed
/// fetch changes nothing here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsumptionState {
    pub daily: PeriodSeries<NaiveDate>,
    pub monthly: PeriodSeries<YearMonth>,
    /// Meter index plus consumption of the most recent daily record.
    pub last_index: Option<i64>,
}

/// Per-period outcome of [`VeoliaClient::update_all`](crate::VeoliaClient::update_all).
#[derive(Debug)]
pub struct RefreshOutcome {
    pub daily: error::Result<()>,
    pub monthly: error::Result<()>,
}

impl RefreshOutcome {
    pub fn all_ok(&self) -> bool {
        self.daily.is_ok() && self.monthly.is_ok()
    }
}
