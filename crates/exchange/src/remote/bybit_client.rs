use std::future::Future;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header::CONTENT_TYPE};
use sha2::Sha256;
use tracing::{debug, error, info};

use common::config::BybitConfig;
use common::models::{AccountType, Category, OrderRequest};

use crate::error::BybitError;
use crate::remote::{
    ApiResponse, CreateOrderBody, InstrumentInfo, InstrumentsPage, OrderResponse, WalletAccount,
    WalletBalanceResult,
};
use crate::traits::TradingApi;

type HmacSha256 = Hmac<Sha256>;

const INSTRUMENTS_PATH: &str = "/v5/market/instruments-info";
const WALLET_BALANCE_PATH: &str = "/v5/account/wallet-balance";
const ORDER_CREATE_PATH: &str = "/v5/order/create";

const INSTRUMENTS_PAGE_LIMIT: u32 = 1000;
/// Stops a misbehaving cursor from paging forever.
const MAX_INSTRUMENT_PAGES: usize = 50;

#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl BybitClient {
    pub fn new(config: &BybitConfig) -> Result<Self, BybitError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        info!(
            "Bybit client ready ({} at {})",
            config.environment, config.base_url
        );

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            recv_window_ms: config.recv_window_ms,
        })
    }

    /// v5 signature: hex HMAC-SHA256 over `timestamp + api_key + recv_window + payload`,
    /// where the payload is the query string (GET) or the raw JSON body (POST).
    pub fn sign(&self, timestamp_ms: i64, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp_ms.to_string().as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(self.recv_window_ms.to_string().as_bytes());
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn authenticate(&self, request: RequestBuilder, payload: &str) -> RequestBuilder {
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.sign(timestamp, payload);

        request
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN-TYPE", "2")
            .header("X-BAPI-SIGN", signature)
    }

    async fn get_public(&self, path: &str, query: &str) -> Result<ApiResponse, BybitError> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        let resp = self.client.get(&url).send().await?;
        Self::read_envelope(path, resp).await
    }

    async fn get_signed(&self, path: &str, query: &str) -> Result<ApiResponse, BybitError> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        let request = self.authenticate(self.client.get(&url), query);
        let resp = request.send().await?;
        Self::read_envelope(path, resp).await
    }

    async fn post_signed(&self, path: &str, body: String) -> Result<ApiResponse, BybitError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .authenticate(self.client.post(&url), &body)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let resp = request.send().await?;
        Self::read_envelope(path, resp).await
    }

    async fn read_envelope(path: &str, resp: Response) -> Result<ApiResponse, BybitError> {
        let status = resp.status();
        let text = resp.text().await?;
        Self::decode_envelope(path, status, text)
    }

    fn decode_envelope(
        path: &str,
        status: StatusCode,
        text: String,
    ) -> Result<ApiResponse, BybitError> {
        if !status.is_success() {
            error!("Bybit {} failed with HTTP {}: {}", path, status, text);
            return Err(BybitError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope = serde_json::from_str::<ApiResponse>(&text)?;
        debug!(
            "Bybit {} -> retCode={} retMsg={}",
            path, envelope.ret_code, envelope.ret_msg
        );
        Ok(envelope)
    }

    pub async fn get_instruments_page(
        &self,
        category: Category,
        cursor: Option<&str>,
    ) -> Result<InstrumentsPage, BybitError> {
        let mut query = format!(
            "category={}&limit={}",
            category.as_str(),
            INSTRUMENTS_PAGE_LIMIT
        );
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            query.push_str("&cursor=");
            query.push_str(cursor);
        }
        self.get_public(INSTRUMENTS_PATH, &query)
            .await?
            .into_result::<InstrumentsPage>()
    }
}

/// Follows `nextPageCursor` until it comes back empty.
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<InstrumentInfo>, BybitError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<InstrumentsPage, BybitError>>,
{
    let mut instruments = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_INSTRUMENT_PAGES {
        let page = fetch_page(cursor.take()).await?;
        instruments.extend(page.list);

        if page.next_page_cursor.is_empty() {
            return Ok(instruments);
        }
        cursor = Some(page.next_page_cursor);
    }

    error!(
        "Instrument catalog still paging after {} pages ({} entries)",
        MAX_INSTRUMENT_PAGES,
        instruments.len()
    );
    Err(BybitError::Malformed(format!(
        "instrument catalog did not end within {} pages",
        MAX_INSTRUMENT_PAGES
    )))
}

#[async_trait]
impl TradingApi for BybitClient {
    async fn get_instruments_info(
        &self,
        category: Category,
    ) -> Result<Vec<InstrumentInfo>, BybitError> {
        collect_pages(move |cursor| async move {
            self.get_instruments_page(category, cursor.as_deref()).await
        })
        .await
    }

    async fn get_wallet_balance(
        &self,
        account_type: AccountType,
    ) -> Result<Vec<WalletAccount>, BybitError> {
        let query = format!("accountType={}", account_type.as_str());
        let result = self
            .get_signed(WALLET_BALANCE_PATH, &query)
            .await?
            .into_result::<WalletBalanceResult>()?;
        Ok(result.list)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, BybitError> {
        let body = serde_json::to_string(&CreateOrderBody::from(order))?;
        let envelope = self.post_signed(ORDER_CREATE_PATH, body).await?;
        Ok(OrderResponse::from(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::BybitEnvironment;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn client() -> BybitClient {
        BybitClient::new(&BybitConfig {
            api_key: "my_api_key".to_string(),
            api_secret: "very_secret".to_string(),
            environment: BybitEnvironment::Demo,
            base_url: BybitEnvironment::Demo.rest_base_url().to_string(),
            recv_window_ms: 5000,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_sign_query_string() {
        let signature = client().sign(1700000000000, "accountType=UNIFIED");
        assert_eq!(
            signature,
            "10eb74090460df364fad5217d1c73c55f0477d0747d8e463beb4f3a24f149e29"
        );
    }

    #[test]
    fn test_sign_json_body() {
        let signature = client().sign(1700000000000, r#"{"category":"linear","symbol":"BTCUSDT"}"#);
        assert_eq!(
            signature,
            "e582525c2a1ad8aeb876e8a95bb90a9630d97a4dea78c91a0909efd1ab973160"
        );
    }

    #[test]
    fn test_signature_depends_on_timestamp() {
        let c = client();
        assert_ne!(c.sign(1, "a=1"), c.sign(2, "a=1"));
        assert_eq!(c.sign(1, "a=1").len(), 64);
    }

    fn page(symbols: &[&str], next: &str) -> InstrumentsPage {
        InstrumentsPage {
            list: symbols
                .iter()
                .map(|s| InstrumentInfo {
                    symbol: s.to_string(),
                    ..Default::default()
                })
                .collect(),
            next_page_cursor: next.to_string(),
        }
    }

    #[tokio::test]
    async fn test_collects_every_page() {
        let mut pages = VecDeque::from(vec![
            page(&["BTCUSDT", "ETHUSDT"], "c1"),
            page(&["SOLUSDT"], "c2"),
            page(&["XRPUSDT"], ""),
        ]);
        let mut cursors = Vec::new();

        let instruments = collect_pages(|cursor| {
            cursors.push(cursor);
            let next = pages.pop_front().ok_or_else(|| BybitError::Malformed("no page".into()));
            async move { next }
        })
        .await
        .unwrap();

        let symbols: Vec<&str> = instruments.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"]);
        assert_eq!(
            cursors,
            [None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_page_error_stops_paging() {
        let mut calls = 0;
        let result = collect_pages(|_| {
            calls += 1;
            let next = if calls == 1 {
                Ok(page(&["BTCUSDT"], "c1"))
            } else {
                Err(BybitError::Status {
                    status: 503,
                    body: "busy".to_string(),
                })
            };
            async move { next }
        })
        .await;

        assert!(matches!(result, Err(BybitError::Status { status: 503, .. })));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_endless_cursor_is_malformed() {
        let mut calls = 0;
        let result = collect_pages(|_| {
            calls += 1;
            async { Ok(page(&["BTCUSDT"], "again")) }
        })
        .await;

        assert!(matches!(result, Err(BybitError::Malformed(_))));
        assert_eq!(calls, MAX_INSTRUMENT_PAGES);
    }

    #[test]
    fn test_http_error_status_keeps_body() {
        let result = BybitClient::decode_envelope(
            WALLET_BALANCE_PATH,
            StatusCode::FORBIDDEN,
            "<html>403 Forbidden</html>".to_string(),
        );
        match result {
            Err(BybitError::Status { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "<html>403 Forbidden</html>");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_body_is_decode_error() {
        let result =
            BybitClient::decode_envelope(WALLET_BALANCE_PATH, StatusCode::OK, "not json".to_string());
        assert!(matches!(result, Err(BybitError::Decode(_))));
    }

    #[test]
    fn test_envelope_with_api_error_is_returned() {
        let envelope = BybitClient::decode_envelope(
            ORDER_CREATE_PATH,
            StatusCode::OK,
            r#"{"retCode":10001,"retMsg":"params error","result":{}}"#.to_string(),
        )
        .unwrap();
        assert_eq!(envelope.ret_code, 10001);
        assert_eq!(envelope.ret_msg, "params error");
    }
}
