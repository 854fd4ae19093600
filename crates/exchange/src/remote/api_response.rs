use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::BybitError;

pub const RET_CODE_OK: i64 = 0;

/// The `{retCode, retMsg, result}` envelope every v5 endpoint answers with.
///
/// `result` is kept as raw JSON because failed calls return `{}` there.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub ret_ext_info: serde_json::Value,
    #[serde(default)]
    pub time: Option<i64>,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.ret_code == RET_CODE_OK
    }

    /// Decodes `result`, treating a non-zero `retCode` as an error.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, BybitError> {
        if !self.is_ok() {
            return Err(BybitError::Api {
                code: self.ret_code,
                message: self.ret_msg,
            });
        }
        Ok(serde_json::from_value(self.result)?)
    }

    /// The whole envelope as JSON, as the exchange sent it.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "retCode": self.ret_code,
            "retMsg": self.ret_msg,
            "result": self.result,
            "retExtInfo": self.ret_ext_info,
            "time": self.time,
        })
    }
}

/// Bybit sends numbers as strings, sometimes empty ones. Missing and blank
/// values are `None`; anything else must be a decimal.
pub(crate) fn parse_decimal(field: &str, raw: Option<&str>) -> Result<Option<Decimal>, BybitError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map(Some)
        .map_err(|_| BybitError::Malformed(format!("{} is not a number: {:?}", field, raw)))
}
