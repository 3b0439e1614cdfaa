//! Income registration ("чек") on top of an authenticated session.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::session::Session;

pub const INCOME_ENDPOINT: &str = "income";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// One line of the receipt. Amounts are held in kopecks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLine {
    pub name: String,
    pub amount_kopecks: u64,
    pub quantity: u32,
}

impl ServiceLine {
    pub fn new(name: impl Into<String>, amount_kopecks: u64, quantity: u32) -> Self {
        Self {
            name: name.into(),
            amount_kopecks,
            quantity,
        }
    }

    /// Builds a line from a price in rubles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the amount is not finite, is
    /// negative, or has more than two decimal places.
    pub fn from_rubles(name: impl Into<String>, amount: f64, quantity: u32) -> Result<Self> {
        let name = name.into();
        let kopecks = rubles_to_kopecks(amount).ok_or_else(|| {
            Error::InvalidRequest(format!("invalid amount {} for \"{}\"", amount, name))
        })?;
        Ok(Self::new(name, kopecks, quantity))
    }

    fn total_kopecks(&self) -> Option<u64> {
        self.amount_kopecks.checked_mul(u64::from(self.quantity))
    }
}

/// An income to register, paid in cash by an individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Income {
    operation_time: DateTime<Utc>,
    services: Vec<ServiceLine>,
}

impl Income {
    pub fn new(operation_time: DateTime<Utc>) -> Self {
        Self {
            operation_time,
            services: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: ServiceLine) -> Self {
        self.services.push(service);
        self
    }

    pub fn services(&self) -> &[ServiceLine] {
        &self.services
    }

    /// Sum of `amount × quantity` over all lines, `None` on overflow.
    pub fn total_kopecks(&self) -> Option<u64> {
        self.services
            .iter()
            .try_fold(0u64, |acc, s| acc.checked_add(s.total_kopecks()?))
    }

    /// Builds the request body, stamped with `request_time`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if there are no service lines, a line
    /// has a zero amount or zero quantity, or the total overflows.
    pub fn to_payload(&self, request_time: DateTime<Utc>) -> Result<Value> {
        if self.services.is_empty() {
            return Err(Error::InvalidRequest(
                "income needs at least one service line".to_string(),
            ));
        }
        if let Some(line) = self
            .services
            .iter()
            .find(|s| s.amount_kopecks == 0 || s.quantity == 0)
        {
            return Err(Error::InvalidRequest(format!(
                "\"{}\" needs a positive amount and quantity",
                line.name
            )));
        }
        let total = self
            .total_kopecks()
            .ok_or_else(|| Error::InvalidRequest("total amount is too large".to_string()))?;

        let payload = IncomePayload {
            payment_type: "CASH",
            ignore_max_total_income_restriction: false,
            client: IncomeClient {
                contact_phone: None,
                display_name: None,
                income_type: "FROM_INDIVIDUAL",
                inn: None,
            },
            request_time: format_time(request_time),
            operation_time: format_time(self.operation_time),
            services: self
                .services
                .iter()
                .map(|s| ServicePayload {
                    name: &s.name,
                    amount: format_kopecks(s.amount_kopecks),
                    quantity: s.quantity,
                })
                .collect(),
            total_amount: format_kopecks(total),
        };
        Ok(serde_json::to_value(payload)?)
    }
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomeReceipt {
    Registered {
        receipt_id: String,
        print_url: String,
    },
    /// The server answered without a receipt id. Holds the raw response.
    Rejected { response: Value },
}

impl IncomeReceipt {
    /// `{"error": <raw response>}` for rejected incomes.
    pub fn error_wrapper(&self) -> Option<Value> {
        match self {
            IncomeReceipt::Rejected { response } => {
                Some(serde_json::json!({ "error": response }))
            }
            IncomeReceipt::Registered { .. } => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IncomePayload<'a> {
    payment_type: &'static str,
    ignore_max_total_income_restriction: bool,
    client: IncomeClient,
    request_time: String,
    operation_time: String,
    services: Vec<ServicePayload<'a>>,
    total_amount: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IncomeClient {
    contact_phone: Option<String>,
    display_name: Option<String>,
    income_type: &'static str,
    inn: Option<String>,
}

#[derive(Serialize)]
struct ServicePayload<'a> {
    name: &'a str,
    amount: String,
    quantity: u32,
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn format_kopecks(kopecks: u64) -> String {
    format!("{}.{:02}", kopecks / 100, kopecks % 100)
}

fn rubles_to_kopecks(amount: f64) -> Option<u64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let kopecks = (amount * 100.0).round();
    // Anything left over after rounding is a fraction of a kopeck.
    if kopecks >= u64::MAX as f64 || (kopecks / 100.0 - amount).abs() > 1e-9 {
        return None;
    }
    Some(kopecks as u64)
}

/// Printable receipt address for a registered income.
pub fn receipt_url(api_url: &str, owner_id: &str, receipt_id: &str) -> String {
    format!("{}/receipt/{}/{}/print", api_url, owner_id, receipt_id)
}

/// Registers `income` and returns the printable receipt address.
#[tracing::instrument(skip(session, income))]
pub async fn register_income<T: Transport, C: Clock>(
    session: &mut Session<T, C>,
    income: &Income,
) -> Result<IncomeReceipt> {
    let payload = income.to_payload(session.now())?;
    let response = session.call(INCOME_ENDPOINT, Some(payload)).await?;
    Ok(receipt_from_response(session, response))
}

fn receipt_from_response<T: Transport, C: Clock>(
    session: &Session<T, C>,
    response: Value,
) -> IncomeReceipt {
    let receipt_id = response
        .get("approvedReceiptUuid")
        .and_then(Value::as_str)
        .map(str::to_string);

    match (receipt_id, session.owner_id()) {
        (Some(receipt_id), Some(owner_id)) => {
            let print_url = receipt_url(session.config().api_url(), owner_id, &receipt_id);
            info!("Income registered, receipt {}", receipt_id);
            IncomeReceipt::Registered {
                receipt_id,
                print_url,
            }
        }
        _ => {
            warn!("Income was not registered: {}", response);
            IncomeReceipt::Rejected { response }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::http::{ApiResponse, MockTransport};
    use crate::clock::{MockClock, SystemClock};
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn session(transport: MockTransport) -> Session<MockTransport, SystemClock> {
        let config = SessionConfig::new("123", "secret")
            .unwrap()
            .with_api_url("https://api.test/v1");
        Session::with_parts(config, transport, SystemClock)
    }

    fn expect_login(transport: &mut MockTransport) {
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/auth/lkfl"))
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::ok(json!({
                    "token": "A",
                    "tokenExpireIn": "2999-01-01T00:00:00.000Z",
                    "refreshToken": "R1",
                    "profile": {"inn": "123"}
                })))
            });
    }

    #[test]
    fn test_payload_shape() {
        let income = Income::new(at("2024-03-01T12:30:00Z"))
            .with_service(ServiceLine::new("Consulting", 100_000, 1));
        let payload = income.to_payload(at("2024-03-01T12:31:00.5Z")).unwrap();

        assert_eq!(
            payload,
            json!({
                "paymentType": "CASH",
                "ignoreMaxTotalIncomeRestriction": false,
                "client": {
                    "contactPhone": null,
                    "displayName": null,
                    "incomeType": "FROM_INDIVIDUAL",
                    "inn": null
                },
                "requestTime": "2024-03-01T12:31:00.500000Z",
                "operationTime": "2024-03-01T12:30:00.000000Z",
                "services": [{"name": "Consulting", "amount": "1000.00", "quantity": 1}],
                "totalAmount": "1000.00"
            })
        );
    }

    #[test]
    fn test_total_covers_all_lines() {
        let income = Income::new(at("2024-03-01T12:30:00Z"))
            .with_service(ServiceLine::new("A", 1050, 2))
            .with_service(ServiceLine::new("B", 400, 1));
        assert_eq!(income.total_kopecks(), Some(2500));

        let payload = income.to_payload(at("2024-03-01T12:30:00Z")).unwrap();
        assert_eq!(payload["totalAmount"], "25.00");
        assert_eq!(payload["services"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_no_services_rejected() {
        let income = Income::new(at("2024-03-01T12:30:00Z"));
        assert!(matches!(
            income.to_payload(at("2024-03-01T12:30:00Z")),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let income = Income::new(at("2024-03-01T12:30:00Z"))
            .with_service(ServiceLine::new("Free", 0, 1));
        assert!(matches!(
            income.to_payload(at("2024-03-01T12:30:00Z")),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let income = Income::new(at("2024-03-01T12:30:00Z"))
            .with_service(ServiceLine::new("A", 1000, 0));
        assert!(matches!(
            income.to_payload(at("2024-03-01T12:30:00Z")),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_total_overflow_rejected() {
        let income = Income::new(at("2024-03-01T12:30:00Z"))
            .with_service(ServiceLine::new("A", u64::MAX, 2));
        assert!(matches!(
            income.to_payload(at("2024-03-01T12:30:00Z")),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_from_rubles_converts_to_kopecks() {
        assert_eq!(
            ServiceLine::from_rubles("A", 1500.5, 1).unwrap().amount_kopecks,
            150_050
        );
        assert_eq!(ServiceLine::from_rubles("A", 0.1, 1).unwrap().amount_kopecks, 10);
        assert_eq!(ServiceLine::from_rubles("A", 19.99, 1).unwrap().amount_kopecks, 1999);
    }

    #[test]
    fn test_from_rubles_rejects_fractions_of_a_kopeck() {
        for amount in [0.125, 1.005, 0.001] {
            assert!(
                matches!(
                    ServiceLine::from_rubles("A", amount, 1),
                    Err(Error::InvalidRequest(_))
                ),
                "{amount} must be rejected"
            );
        }
    }

    #[test]
    fn test_from_rubles_rejects_negative_and_non_finite() {
        for amount in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(ServiceLine::from_rubles("A", amount, 1).is_err());
        }
    }

    #[test]
    fn test_total_matches_sum_of_sent_lines() {
        let income = Income::new(at("2024-03-01T12:30:00Z"))
            .with_service(ServiceLine::from_rubles("A", 0.13, 3).unwrap())
            .with_service(ServiceLine::from_rubles("B", 0.07, 7).unwrap());
        let payload = income.to_payload(at("2024-03-01T12:30:00Z")).unwrap();

        assert_eq!(payload["services"][0]["amount"], "0.13");
        assert_eq!(payload["services"][1]["amount"], "0.07");
        assert_eq!(payload["totalAmount"], "0.88");
    }

    #[test]
    fn test_receipt_url() {
        assert_eq!(
            receipt_url("https://lknpd.nalog.ru/api/v1", "123", "U1"),
            "https://lknpd.nalog.ru/api/v1/receipt/123/U1/print"
        );
    }

    #[tokio::test]
    async fn test_register_income_returns_print_url() {
        let mut transport = MockTransport::new();
        expect_login(&mut transport);
        transport
            .expect_send()
            .withf(|req| req.url == "https://api.test/v1/income" && req.payload.is_some())
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(json!({"approvedReceiptUuid": "U1"}))));

        let mut session = session(transport);
        let income = Income::new(Utc::now()).with_service(ServiceLine::new("Consulting", 100, 1));
        let receipt = register_income(&mut session, &income).await.unwrap();

        assert_eq!(
            receipt,
            IncomeReceipt::Registered {
                receipt_id: "U1".to_string(),
                print_url: "https://api.test/v1/receipt/123/U1/print".to_string(),
            }
        );
        assert!(receipt.error_wrapper().is_none());
    }

    #[tokio::test]
    async fn test_register_income_without_receipt_id_is_rejected() {
        let mut transport = MockTransport::new();
        expect_login(&mut transport);
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/income"))
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(json!({}))));

        let mut session = session(transport);
        let income = Income::new(Utc::now()).with_service(ServiceLine::new("Consulting", 100, 1));
        let receipt = register_income(&mut session, &income).await.unwrap();

        assert_eq!(receipt, IncomeReceipt::Rejected { response: json!({}) });
        assert_eq!(receipt.error_wrapper(), Some(json!({"error": {}})));
    }

    #[tokio::test]
    async fn test_register_income_stamps_request_time_from_session_clock() {
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .returning(|| at("2024-01-01T00:05:00Z"));

        let mut transport = MockTransport::new();
        expect_login(&mut transport);
        transport
            .expect_send()
            .withf(|req| {
                req.url.ends_with("/income")
                    && req.payload.as_ref().is_some_and(|p| {
                        p["requestTime"] == "2024-01-01T00:05:00.000000Z"
                    })
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(json!({"approvedReceiptUuid": "U1"}))));

        let config = SessionConfig::new("123", "secret")
            .unwrap()
            .with_api_url("https://api.test/v1");
        let mut session = Session::with_parts(config, transport, clock);
        let income = Income::new(at("2024-01-01T00:00:00Z"))
            .with_service(ServiceLine::new("Consulting", 100, 1));

        assert!(matches!(
            register_income(&mut session, &income).await.unwrap(),
            IncomeReceipt::Registered { .. }
        ));
    }

    #[tokio::test]
    async fn test_register_income_invalid_request_makes_no_call() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let mut session = session(transport);
        let income = Income::new(Utc::now());
        let result = register_income(&mut session, &income).await;

        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}
