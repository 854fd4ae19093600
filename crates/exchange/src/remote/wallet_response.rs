use rust_decimal::Decimal;
use serde::Deserialize;

use common::models::WalletSnapshot;

use crate::error::BybitError;

use super::api_response::parse_decimal;

/// `result` of `GET /v5/account/wallet-balance`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct WalletBalanceResult {
    #[serde(default)]
    pub list: Vec<WalletAccount>,
}

/// One sub-account of the wallet response.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub coin: Vec<CoinBalance>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    pub coin: String,
    #[serde(default)]
    pub equity: Option<String>,
    #[serde(default)]
    pub wallet_balance: Option<String>,
    #[serde(default)]
    pub usd_value: Option<String>,
}

impl CoinBalance {
    /// Missing or blank amounts count as zero; a non-numeric one is malformed.
    pub fn to_snapshot(&self) -> Result<WalletSnapshot, BybitError> {
        let amount = |field: &str, raw: &Option<String>| {
            parse_decimal(field, raw.as_deref()).map(|v| v.unwrap_or(Decimal::ZERO))
        };

        Ok(WalletSnapshot {
            coin: self.coin.clone(),
            wallet_balance: amount("walletBalance", &self.wallet_balance)?,
            equity: amount("equity", &self.equity)?,
            usd_value: amount("usdValue", &self.usd_value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parses_unified_wallet() {
        let body = r#"{
            "list": [{
                "accountType": "UNIFIED",
                "totalEquity": "3.31216591",
                "coin": [
                    {"coin": "BTC", "equity": "0.00004", "walletBalance": "0.00004", "usdValue": "2.6"},
                    {"coin": "USDT", "equity": "1000.5", "walletBalance": "998.25", "usdValue": "1000.1", "locked": "0"}
                ]
            }]
        }"#;
        let result: WalletBalanceResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.list.len(), 1);
        assert_eq!(result.list[0].account_type, "UNIFIED");

        let usdt = result.list[0].coin[1].to_snapshot().unwrap();
        assert_eq!(usdt.coin, "USDT");
        assert_eq!(usdt.wallet_balance, dec!(998.25));
        assert_eq!(usdt.equity, dec!(1000.5));
        assert_eq!(usdt.usd_value, dec!(1000.1));
    }

    #[test]
    fn test_blank_and_missing_numbers_are_zero() {
        let coin: CoinBalance =
            serde_json::from_str(r#"{"coin":"USDT","walletBalance":"","equity":"12"}"#).unwrap();
        let snapshot = coin.to_snapshot().unwrap();
        assert_eq!(snapshot.wallet_balance, Decimal::ZERO);
        assert_eq!(snapshot.equity, dec!(12));
        assert_eq!(snapshot.usd_value, Decimal::ZERO);
    }

    #[test]
    fn test_non_numeric_balance_is_malformed() {
        let coin: CoinBalance =
            serde_json::from_str(r#"{"coin":"USDT","walletBalance":"abc","equity":"12"}"#)
                .unwrap();
        match coin.to_snapshot() {
            Err(BybitError::Malformed(msg)) => assert!(msg.contains("walletBalance")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_account_without_coins() {
        let result: WalletBalanceResult =
            serde_json::from_str(r#"{"list":[{"accountType":"UNIFIED"}]}"#).unwrap();
        assert!(result.list[0].coin.is_empty());

        let empty: WalletBalanceResult = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.list.is_empty());
    }
}
