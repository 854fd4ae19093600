use serde::{Deserialize, Serialize};

use common::models::{Category, OrderRequest, OrderType, Side, TimeInForce};

use super::api_response::ApiResponse;

/// JSON body of `POST /v5/order/create`. Bybit wants decimals as strings.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub category: Category,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: String,
    pub price: String,
    pub time_in_force: TimeInForce,
    pub stop_loss: String,
    pub take_profit: String,
}

impl From<&OrderRequest> for CreateOrderBody {
    fn from(order: &OrderRequest) -> Self {
        Self {
            category: order.category,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            qty: order.qty.to_string(),
            price: order.price.to_string(),
            time_in_force: order.time_in_force,
            stop_loss: order.stop_loss.to_string(),
            take_profit: order.take_profit.to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// Outcome of an order submission. A non-zero `ret_code` is a rejection,
/// not a transport failure. `raw` is the full envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponse {
    pub ret_code: i64,
    pub ret_msg: String,
    pub created: Option<OrderCreated>,
    pub raw: serde_json::Value,
}

impl OrderResponse {
    pub fn is_success(&self) -> bool {
        self.ret_code == super::api_response::RET_CODE_OK
    }

    pub fn order_id(&self) -> Option<&str> {
        self.created
            .as_ref()
            .map(|c| c.order_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

impl From<ApiResponse> for OrderResponse {
    fn from(resp: ApiResponse) -> Self {
        let created = if resp.is_ok() {
            serde_json::from_value::<OrderCreated>(resp.result.clone()).ok()
        } else {
            None
        };
        let raw = resp.to_json();
        Self {
            ret_code: resp.ret_code,
            ret_msg: resp.ret_msg,
            created,
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::TradeSignal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_body_matches_bybit_schema() {
        let signal = TradeSignal {
            symbol: "BTCUSDT".to_string(),
            price: dec!(65000.5),
            stop_loss: dec!(64000),
            take_profit: dec!(67000),
        };
        let order = OrderRequest::bracketed_buy(&signal, dec!(0.015));
        let body = serde_json::to_value(CreateOrderBody::from(&order)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "category": "linear",
                "symbol": "BTCUSDT",
                "side": "Buy",
                "orderType": "Limit",
                "qty": "0.015",
                "price": "65000.5",
                "timeInForce": "GTC",
                "stopLoss": "64000",
                "takeProfit": "67000"
            })
        );
    }

    #[test]
    fn test_success_response() {
        let api: ApiResponse = serde_json::from_str(
            r#"{"retCode":0,"retMsg":"OK","result":{"orderId":"1321003749386327552","orderLinkId":"spot-test-postonly"},"retExtInfo":{},"time":1672211918471}"#,
        )
        .unwrap();
        let resp = OrderResponse::from(api);
        assert!(resp.is_success());
        assert_eq!(resp.order_id(), Some("1321003749386327552"));
        assert_eq!(resp.raw["retMsg"], "OK");
        assert_eq!(resp.raw["time"], 1672211918471i64);
        assert_eq!(resp.raw["result"]["orderLinkId"], "spot-test-postonly");
    }

    #[test]
    fn test_rejected_response() {
        let api: ApiResponse = serde_json::from_str(
            r#"{"retCode":110007,"retMsg":"ab not enough for new order","result":{},"retExtInfo":{},"time":1672211918471}"#,
        )
        .unwrap();
        let resp = OrderResponse::from(api);
        assert!(!resp.is_success());
        assert_eq!(resp.ret_msg, "ab not enough for new order");
        assert_eq!(resp.order_id(), None);
        assert_eq!(resp.raw["retCode"], 110007);
    }
}
