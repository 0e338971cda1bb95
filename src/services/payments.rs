//! ToyyibPay gateway adapter.
//!
//! The provider offers no cryptographic webhook signature, so
//! authenticity is established by querying the bill's own transaction
//! record out of band and cross-checking the external reference
//! against the order id the webhook claims.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;

/// Provider key used in the idempotency ledger.
pub const PROVIDER: &str = "toyyibpay";

/// Callback body the gateway delivers, form-encoded or JSON. Every
/// field is attacker-controlled input on an unauthenticated endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub refno: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub billcode: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub transaction_time: Option<String>,
}

impl WebhookPayload {
    /// Parses an `application/x-www-form-urlencoded` body. Unknown
    /// fields are ignored; missing fields stay empty and fail
    /// verification downstream.
    pub fn from_form_bytes(bytes: &[u8]) -> Self {
        let mut payload = WebhookPayload::default();
        for (key, value) in url::form_urlencoded::parse(bytes) {
            match key.as_ref() {
                "refno" => payload.refno = value.into_owned(),
                "status" => payload.status = value.into_owned(),
                "reason" => payload.reason = value.into_owned(),
                "billcode" => payload.billcode = value.into_owned(),
                "order_id" => payload.order_id = value.into_owned(),
                "amount" => payload.amount = value.into_owned(),
                "transaction_time" => payload.transaction_time = Some(value.into_owned()),
                _ => {}
            }
        }
        payload
    }

    /// Composite idempotency key. Neither the bill code nor the
    /// gateway reference alone is unique per delivery attempt.
    pub fn event_id(&self) -> String {
        format!("{}:{}", self.billcode, self.refno)
    }
}

#[derive(Debug, Clone)]
pub struct CreateBillRequest {
    pub bill_name: String,
    pub bill_description: String,
    /// Major currency units; converted to minor units at the wire.
    pub amount: Decimal,
    pub return_url: String,
    pub callback_url: String,
    /// Internal order id, echoed back by the gateway as
    /// `billExternalReferenceNo` and used for webhook verification.
    pub external_reference: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
}

#[derive(Debug, Clone)]
pub struct CreatedBill {
    pub bill_code: String,
    pub payment_url: String,
}

/// Subset of the gateway's transaction record this service reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillTransaction {
    #[serde(rename = "billExternalReferenceNo", default)]
    pub external_reference: String,
    #[serde(rename = "billpaymentStatus", default)]
    pub payment_status: String,
    #[serde(rename = "billpaymentInvoiceNo", default)]
    pub invoice_no: String,
    #[serde(rename = "billPaymentChannel", default)]
    pub payment_channel: String,
    #[serde(rename = "paidAmount", default)]
    pub paid_amount: String,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookVerification {
    pub is_valid: bool,
    /// The gateway-verified order id. Always preferred over the raw
    /// webhook field when acting on the payment.
    pub order_id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_bill(&self, request: &CreateBillRequest) -> Result<CreatedBill, ServiceError>;

    async fn get_bill_transactions(
        &self,
        bill_code: &str,
    ) -> Result<Vec<BillTransaction>, ServiceError>;

    async fn verify_webhook(&self, payload: &WebhookPayload) -> WebhookVerification;
}

/// Whether a webhook status string reports a successful payment. Any
/// other value is "not successful", not an error.
pub fn is_payment_successful(status: &str) -> bool {
    status == "1" || status.eq_ignore_ascii_case("success")
}

/// Converts a major-unit amount to integer minor units (RM 1 = 100),
/// rounded. The single conversion point for the whole service.
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
}

/// ToyyibPay HTTP client, explicitly constructed with its
/// configuration and injected where needed.
pub struct ToyyibPayGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    category_code: String,
}

impl ToyyibPayGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        category_code: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            category_code: category_code.into(),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/index.php/api/{name}", self.base_url)
    }
}

#[async_trait]
impl PaymentGateway for ToyyibPayGateway {
    #[instrument(skip(self, request), fields(external_reference = %request.external_reference))]
    async fn create_bill(&self, request: &CreateBillRequest) -> Result<CreatedBill, ServiceError> {
        let params: Vec<(&str, String)> = vec![
            ("userSecretKey", self.secret_key.clone()),
            ("categoryCode", self.category_code.clone()),
            ("billName", request.bill_name.clone()),
            ("billDescription", request.bill_description.clone()),
            ("billPriceSetting", "1".to_string()),
            ("billPayorInfo", "1".to_string()),
            ("billAmount", to_minor_units(request.amount).to_string()),
            ("billReturnUrl", request.return_url.clone()),
            ("billCallbackUrl", request.callback_url.clone()),
            ("billExternalReferenceNo", request.external_reference.clone()),
            ("billTo", request.payer_name.clone()),
            ("billEmail", request.payer_email.clone()),
            ("billPhone", request.payer_phone.clone()),
            ("billChargeToCustomer", "1".to_string()),
        ];

        let response = self
            .http
            .post(self.endpoint("createBill"))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalApiError(format!("createBill request failed: {e}")))?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ServiceError::ExternalApiError(format!("createBill returned an unreadable body: {e}"))
        })?;

        match body.get(0).and_then(|b| b.get("BillCode")).and_then(|v| v.as_str()) {
            Some(bill_code) => {
                let payment_url = format!("{}/{bill_code}", self.base_url);
                info!(bill_code, "payment bill created");
                Ok(CreatedBill {
                    bill_code: bill_code.to_string(),
                    payment_url,
                })
            }
            None => {
                error!(response = %body, "gateway did not return a bill code");
                Err(ServiceError::ExternalApiError(
                    "gateway did not return a bill code".to_string(),
                ))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_bill_transactions(
        &self,
        bill_code: &str,
    ) -> Result<Vec<BillTransaction>, ServiceError> {
        let params = [("billCode", bill_code)];
        let response = self
            .http
            .post(self.endpoint("getBillTransactions"))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalApiError(format!("getBillTransactions request failed: {e}"))
            })?;

        // An unknown bill code comes back as a bare string, which fails
        // to deserialize and lands in the error arm.
        response.json().await.map_err(|e| {
            ServiceError::ExternalApiError(format!(
                "getBillTransactions returned an unexpected body: {e}"
            ))
        })
    }

    #[instrument(skip(self, payload), fields(billcode = %payload.billcode))]
    async fn verify_webhook(&self, payload: &WebhookPayload) -> WebhookVerification {
        let transactions = match self.get_bill_transactions(&payload.billcode).await {
            Ok(transactions) => transactions,
            Err(e) => {
                warn!(error = %e, "webhook verification query failed");
                return WebhookVerification::default();
            }
        };

        let Some(transaction) = transactions.first() else {
            warn!("webhook verification failed: no transactions for bill");
            return WebhookVerification::default();
        };

        if transaction.external_reference != payload.order_id {
            warn!(
                expected = %transaction.external_reference,
                received = %payload.order_id,
                "webhook verification failed: order id mismatch"
            );
            return WebhookVerification::default();
        }

        WebhookVerification {
            is_valid: true,
            order_id: Some(transaction.external_reference.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(base_url: &str) -> ToyyibPayGateway {
        ToyyibPayGateway::new(base_url, "sk-test", "cat1", Duration::from_secs(2))
            .expect("gateway client")
    }

    #[test]
    fn payment_success_predicate_is_narrow() {
        assert!(is_payment_successful("1"));
        assert!(is_payment_successful("success"));
        assert!(is_payment_successful("SUCCESS"));
        assert!(!is_payment_successful("2"));
        assert!(!is_payment_successful("pending"));
        assert!(!is_payment_successful(""));
    }

    #[test]
    fn minor_units_round_major_amounts() {
        assert_eq!(to_minor_units(dec!(19)), 1900);
        assert_eq!(to_minor_units(dec!(59.00)), 5900);
        assert_eq!(to_minor_units(dec!(10.005)), 1000);
        assert_eq!(to_minor_units(dec!(10.015)), 1002);
    }

    #[test]
    fn form_bodies_parse_into_payloads() {
        let body = b"refno=TP123&status=1&reason=&billcode=abc&order_id=ord-1&amount=5900&extra=x";
        let payload = WebhookPayload::from_form_bytes(body);
        assert_eq!(payload.refno, "TP123");
        assert_eq!(payload.status, "1");
        assert_eq!(payload.billcode, "abc");
        assert_eq!(payload.order_id, "ord-1");
        assert_eq!(payload.event_id(), "abc:TP123");
    }

    #[tokio::test]
    async fn create_bill_parses_the_bill_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/createBill"))
            .and(body_string_contains("billAmount=5900"))
            .and(body_string_contains("billExternalReferenceNo=ord-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"BillCode": "xy12ab"}])))
            .mount(&server)
            .await;

        let created = gateway(&server.uri())
            .create_bill(&CreateBillRequest {
                bill_name: "KEDAI - PRO Plan".into(),
                bill_description: "Langganan pro".into(),
                amount: dec!(59),
                return_url: "http://localhost:3000/thankyou?order=KD-1".into(),
                callback_url: "http://localhost:3000/api/webhooks/toyyibpay".into(),
                external_reference: "ord-1".into(),
                payer_name: "Aisyah".into(),
                payer_email: "aisyah@example.com".into(),
                payer_phone: "+60123456789".into(),
            })
            .await
            .expect("bill created");

        assert_eq!(created.bill_code, "xy12ab");
        assert_eq!(created.payment_url, format!("{}/xy12ab", server.uri()));
    }

    #[tokio::test]
    async fn create_bill_rejects_unexpected_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/createBill"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "error", "msg": "bad"})),
            )
            .mount(&server)
            .await;

        let result = gateway(&server.uri())
            .create_bill(&CreateBillRequest {
                bill_name: "KEDAI - PRO Plan".into(),
                bill_description: "Langganan pro".into(),
                amount: dec!(59),
                return_url: String::new(),
                callback_url: String::new(),
                external_reference: "ord-1".into(),
                payer_name: String::new(),
                payer_email: String::new(),
                payer_phone: String::new(),
            })
            .await;

        assert!(matches!(result, Err(ServiceError::ExternalApiError(_))));
    }

    #[tokio::test]
    async fn verify_webhook_accepts_matching_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/getBillTransactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "billExternalReferenceNo": "ord-1",
                "billpaymentStatus": "1",
                "billpaymentInvoiceNo": "INV-1",
                "billPaymentChannel": "FPX",
                "paidAmount": "59.00"
            }])))
            .mount(&server)
            .await;

        let verification = gateway(&server.uri())
            .verify_webhook(&WebhookPayload {
                billcode: "xy12ab".into(),
                order_id: "ord-1".into(),
                ..Default::default()
            })
            .await;

        assert!(verification.is_valid);
        assert_eq!(verification.order_id.as_deref(), Some("ord-1"));
    }

    #[tokio::test]
    async fn verify_webhook_rejects_mismatched_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/getBillTransactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "billExternalReferenceNo": "ord-1",
                "billpaymentStatus": "1"
            }])))
            .mount(&server)
            .await;

        let verification = gateway(&server.uri())
            .verify_webhook(&WebhookPayload {
                billcode: "xy12ab".into(),
                order_id: "ord-2".into(),
                ..Default::default()
            })
            .await;

        assert!(!verification.is_valid);
        assert!(verification.order_id.is_none());
    }

    #[tokio::test]
    async fn verify_webhook_rejects_unknown_bill() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/getBillTransactions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[KEY-DID-NOT-EXIST]"))
            .mount(&server)
            .await;

        let verification = gateway(&server.uri())
            .verify_webhook(&WebhookPayload {
                billcode: "nope".into(),
                order_id: "ord-1".into(),
                ..Default::default()
            })
            .await;

        assert!(!verification.is_valid);
    }
}
