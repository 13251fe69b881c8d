use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::DomainError;

/// Order as published by upstream services.
///
/// Absent fields decode to their empty value, so a missing mandatory field is
/// reported by [`Order::check`] rather than by [`Order::decode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Order {
    #[validate(length(min = 1, message = "order_uid cannot be empty"))]
    pub order_uid: String,

    #[validate(length(min = 1, message = "track_number cannot be empty"))]
    pub track_number: String,

    #[validate(length(min = 1, message = "entry cannot be empty"))]
    pub entry: String,

    #[validate(nested)]
    pub delivery: Delivery,

    #[validate(nested)]
    pub payment: Payment,

    #[validate(length(min = 1, message = "Order must have at least one item"), nested)]
    pub items: Vec<Item>,

    #[validate(length(min = 1, message = "locale cannot be empty"))]
    pub locale: String,

    pub internal_signature: String,

    #[validate(length(min = 1, message = "customer_id cannot be empty"))]
    pub customer_id: String,

    #[validate(length(min = 1, message = "delivery_service cannot be empty"))]
    pub delivery_service: String,

    pub shardkey: String,

    #[validate(range(min = 0, message = "sm_id cannot be negative"))]
    pub sm_id: i32,

    #[validate(required(message = "date_created is required"))]
    pub date_created: Option<DateTime<Utc>>,

    pub oof_shard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Delivery {
    #[validate(length(min = 1, message = "Recipient name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Phone cannot be empty"))]
    pub phone: String,

    pub zip: String,

    #[validate(length(min = 1, message = "City cannot be empty"))]
    pub city: String,

    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: String,

    pub region: String,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Payment {
    #[validate(length(min = 1, message = "Transaction id cannot be empty"))]
    pub transaction: String,

    pub request_id: String,

    #[validate(length(min = 1, message = "Currency cannot be empty"))]
    pub currency: String,

    #[validate(length(min = 1, message = "Provider cannot be empty"))]
    pub provider: String,

    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,

    #[validate(range(min = 0, message = "Payment timestamp cannot be negative"))]
    pub payment_dt: i64,

    pub bank: String,

    #[validate(range(min = 0, message = "Delivery cost cannot be negative"))]
    pub delivery_cost: i64,

    #[validate(range(min = 0, message = "Goods total cannot be negative"))]
    pub goods_total: i64,

    #[validate(range(min = 0, message = "Custom fee cannot be negative"))]
    pub custom_fee: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Item {
    #[validate(range(min = 1, message = "chrt_id must be positive"))]
    pub chrt_id: i64,

    #[validate(length(min = 1, message = "Item track_number cannot be empty"))]
    pub track_number: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,

    #[validate(length(min = 1, message = "rid cannot be empty"))]
    pub rid: String,

    #[validate(length(min = 1, message = "Item name cannot be empty"))]
    pub name: String,

    #[validate(range(min = 0, max = 100, message = "Sale must be between 0 and 100"))]
    pub sale: i32,

    pub size: String,

    #[validate(range(min = 0, message = "Total price cannot be negative"))]
    pub total_price: i64,

    #[validate(range(min = 1, message = "nm_id must be positive"))]
    pub nm_id: i64,

    pub brand: String,

    #[validate(range(min = 0, message = "Status cannot be negative"))]
    pub status: i32,
}

impl Order {
    /// Parse a wire payload. Only malformed JSON or mistyped fields fail here.
    pub fn decode(payload: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(payload).map_err(DomainError::Decode)
    }

    /// Check mandatory fields across the whole nested record.
    pub fn check(&self) -> Result<(), DomainError> {
        self.validate()?;
        Ok(())
    }

    /// Canonical encoding used for storage and serving.
    pub fn canonical_bytes(&self) -> Result<Bytes, DomainError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(DomainError::Encode)
    }

    /// Stamp a new identity onto the order. The payment transaction follows the order id.
    pub fn with_identity(mut self, order_uid: &str) -> Self {
        self.order_uid = order_uid.to_string();
        self.payment.transaction = order_uid.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ORDER: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    fn valid_order() -> Order {
        Order::decode(VALID_ORDER.as_bytes()).unwrap()
    }

    #[test]
    fn test_valid_order_passes_validation() {
        let order = valid_order();
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.items.len(), 1);
        assert!(order.check().is_ok());
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let result = Order::decode(b"{\"order_uid\": ");
        assert!(matches!(result, Err(DomainError::Decode(_))));
    }

    #[test]
    fn test_wrong_type_is_decode_error() {
        let result = Order::decode(br#"{"order_uid": 42}"#);
        assert!(matches!(result, Err(DomainError::Decode(_))));
    }

    #[test]
    fn test_missing_order_uid_fails_validation() {
        let mut value: serde_json::Value = serde_json::from_str(VALID_ORDER).unwrap();
        value.as_object_mut().unwrap().remove("order_uid");
        let order = Order::decode(value.to_string().as_bytes()).unwrap();

        assert!(matches!(order.check(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_empty_items_fails_validation() {
        let mut order = valid_order();
        order.items.clear();
        assert!(order.check().is_err());
    }

    #[test]
    fn test_nested_item_field_is_validated() {
        let mut order = valid_order();
        order.items[0].rid = String::new();
        assert!(order.check().is_err());
    }

    #[test]
    fn test_invalid_delivery_email_fails_validation() {
        let mut order = valid_order();
        order.delivery.email = "not-an-email".to_string();
        assert!(order.check().is_err());
    }

    #[test]
    fn test_missing_payment_transaction_fails_validation() {
        let mut order = valid_order();
        order.payment.transaction = String::new();
        assert!(order.check().is_err());
    }

    #[test]
    fn test_missing_date_created_fails_validation() {
        let mut order = valid_order();
        order.date_created = None;
        assert!(order.check().is_err());
    }

    #[test]
    fn test_sale_out_of_range_fails_validation() {
        let mut order = valid_order();
        order.items[0].sale = 101;
        assert!(order.check().is_err());
    }

    #[test]
    fn test_canonical_bytes_drop_unknown_fields() {
        let mut value: serde_json::Value = serde_json::from_str(VALID_ORDER).unwrap();
        value["unexpected"] = serde_json::json!("ignored");
        let order = Order::decode(value.to_string().as_bytes()).unwrap();

        let canonical = order.canonical_bytes().unwrap();
        let reparsed: serde_json::Value = serde_json::from_slice(&canonical).unwrap();
        assert!(reparsed.get("unexpected").is_none());
        assert_eq!(Order::decode(&canonical).unwrap(), order);
    }

    #[test]
    fn test_canonical_bytes_are_stable() {
        let order = valid_order();
        let first = order.canonical_bytes().unwrap();
        let second = Order::decode(&first).unwrap().canonical_bytes().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_with_identity_sets_uid_and_transaction() {
        let id = uuid::Uuid::new_v4().to_string();
        let order = valid_order().with_identity(&id);
        assert_eq!(order.order_uid, id);
        assert_eq!(order.payment.transaction, id);
        assert!(order.check().is_ok());
    }
}
