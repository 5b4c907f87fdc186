mod auth;
mod client;
mod config;
mod envelope;
mod error;
mod model;
mod parser;
mod transport;

pub use client::VeoliaClient;
pub use config::{DEFAULT_ENDPOINT, VeoliaConfig};
pub use error::{Error, ParseError, Result};
pub use model::{ConsumptionState, Period, PeriodSeries, Reading, RefreshOutcome, YearMonth};
