use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::BybitError;

use super::api_response::parse_decimal;

/// One page of `GET /v5/market/instruments-info`.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentsPage {
    #[serde(default)]
    pub list: Vec<InstrumentInfo>,
    #[serde(default)]
    pub next_page_cursor: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub symbol: String,
    #[serde(default)]
    pub lot_size_filter: LotSizeFilter,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    #[serde(default)]
    pub qty_step: Option<String>,
}

impl InstrumentInfo {
    pub fn qty_step(&self) -> Result<Option<Decimal>, BybitError> {
        parse_decimal("qtyStep", self.lot_size_filter.qty_step.as_deref())
    }
}
