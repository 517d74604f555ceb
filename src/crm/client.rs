use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::retry::{with_retry, RetryPolicy};
use super::transport::{CrmRequest, CrmTransport, HttpTransport};
use super::types::{Customer, DebtSummary, Invoice, Page, PaymentOutcome, PaymentPayload, PaymentRecord};
use super::CrmError;
use crate::config::WispHubSettings;

/// Peru country calling code, stripped before phone lookups.
const COUNTRY_CODE: &str = "51";
const LOCAL_PHONE_DIGITS: usize = 9;

/// Customer fields a phone number may be stored under, in lookup order.
const PHONE_FIELDS: [&str; 2] = ["celular", "telefono"];

/// Invoice states accepted by different WispHub deployments, in the order tried.
const PAID_STATES: [&str; 2] = ["pagado", "pagada"];

pub const PAYMENT_REGISTERED_MESSAGE: &str = "Pago registrado en WispHub";
pub const PAYMENT_FAILED_MESSAGE: &str = "No se pudo registrar el pago en WispHub";

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// WispHub CRM client. Every request goes through `with_retry`; lookups
/// report failure as `None`/`false` once retries are exhausted.
pub struct WispHubClient {
    transport: Box<dyn CrmTransport + Send + Sync>,
    policy: RetryPolicy,
    sleep: Sleeper,
}

impl WispHubClient {
    pub fn new(transport: Box<dyn CrmTransport + Send + Sync>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            sleep: Arc::new(std::thread::sleep),
        }
    }

    /// Client over HTTPS with `Authorization: Api-Key <token>`.
    pub fn from_settings(settings: &WispHubSettings) -> Result<Self, CrmError> {
        Ok(Self::new(Box::new(HttpTransport::new(settings)?)))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Arc::new(sleep);
        self
    }

    /// One request with retries. `None` once every attempt failed.
    fn request(&self, request: &CrmRequest) -> Option<Value> {
        let label = format!("{} {}", request.method.as_str(), request.path);
        let sleep = |d: Duration| (self.sleep)(d);
        with_retry(&self.policy, &label, sleep, |_attempt| self.transport.send(request)).ok()
    }

    fn first_result<T: DeserializeOwned>(&self, request: &CrmRequest) -> Option<T> {
        let data = self.request(request)?;
        let page: Page<T> = match serde_json::from_value(data) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(path = %request.path, error = %e, "Unexpected WispHub list shape");
                return None;
            }
        };
        page.results.into_iter().next()
    }

    // ──────────────────────────────────────────────
    // Customer lookup
    // ──────────────────────────────────────────────

    /// Look a customer up by phone. Tries `celular` then `telefono`, each with
    /// the local 9-digit number first and the number as given second.
    pub fn find_customer_by_phone(&self, phone: &str) -> Option<Customer> {
        let local = local_phone(phone);
        let mut candidates = vec![local];
        if local != phone {
            candidates.push(phone);
        }

        for field in PHONE_FIELDS {
            for number in &candidates {
                let request = CrmRequest::get("/clientes/").query(field, number);
                if let Some(customer) = self.first_result::<Customer>(&request) {
                    tracing::info!(
                        field,
                        id = ?customer.service_id(),
                        "Customer found by phone"
                    );
                    return Some(customer);
                }
            }
        }

        tracing::info!("No customer found for phone");
        None
    }

    pub fn find_customer_by_name(&self, name: &str) -> Option<Customer> {
        let request = CrmRequest::get("/clientes/").query("search", name);
        let customer = self.first_result::<Customer>(&request)?;
        tracing::info!(id = ?customer.service_id(), "Customer found by name");
        Some(customer)
    }

    /// Look a customer up by service code. Only records with an id count as found.
    pub fn find_customer_by_code(&self, code: &str) -> Option<Customer> {
        let data = self.request(&CrmRequest::get(format!("/clientes/{code}/")))?;
        let customer: Customer = serde_json::from_value(data).ok()?;
        customer.service_id().map(|_| customer)
    }

    /// Phone first, then name.
    pub fn find_customer(&self, phone: Option<&str>, name: Option<&str>) -> Option<Customer> {
        if let Some(customer) = phone.and_then(|p| self.find_customer_by_phone(p)) {
            return Some(customer);
        }
        name.and_then(|n| self.find_customer_by_name(n))
    }

    // ──────────────────────────────────────────────
    // Debt and payments
    // ──────────────────────────────────────────────

    /// Pending invoices of a service. Falls back to the nested endpoint only
    /// when the flat one fails outright.
    pub fn pending_debt(&self, service_id: i64) -> DebtSummary {
        let flat = CrmRequest::get("/facturas/")
            .query("id_servicio", service_id)
            .query("estado", "pendiente");
        let nested = CrmRequest::get(format!("/clientes/{service_id}/facturas/"))
            .query("estado", "pendiente");

        let Some(data) = self.request(&flat).or_else(|| self.request(&nested)) else {
            return DebtSummary::none();
        };

        let invoices = serde_json::from_value::<Page<Invoice>>(data)
            .map(|page| page.results)
            .unwrap_or_default();
        let debt = DebtSummary::from_invoices(invoices);
        tracing::info!(
            service_id,
            has_debt = debt.has_debt,
            amount = debt.amount,
            invoice = ?debt.invoice_id,
            "Pending debt"
        );
        debt
    }

    /// Register a payment. Tries `/pagos/`, then the nested customer endpoint.
    pub fn register_payment(&self, service_id: i64, record: &PaymentRecord) -> PaymentOutcome {
        let payload = PaymentPayload {
            id_servicio: service_id,
            cliente: service_id,
            monto: record.amount,
            fecha_pago: record
                .date
                .clone()
                .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
            medio_pago: record.payment_method.clone(),
            codigo_operacion: record.operation_code.clone(),
            observacion: record.observation(),
        };
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                return PaymentOutcome {
                    success: false,
                    message: e.to_string(),
                    response: None,
                }
            }
        };

        let response = self
            .request(&CrmRequest::post("/pagos/", body.clone()))
            .or_else(|| self.request(&CrmRequest::post(format!("/clientes/{service_id}/pagos/"), body)));

        match response {
            Some(response) => {
                tracing::info!(
                    service_id,
                    operation = record.operation_code.as_deref().unwrap_or("-"),
                    "Payment registered"
                );
                PaymentOutcome {
                    success: true,
                    message: PAYMENT_REGISTERED_MESSAGE.to_string(),
                    response: Some(response),
                }
            }
            None => PaymentOutcome {
                success: false,
                message: PAYMENT_FAILED_MESSAGE.to_string(),
                response: None,
            },
        }
    }

    pub fn mark_invoice_paid(&self, invoice_id: i64) -> bool {
        let path = format!("/facturas/{invoice_id}/");
        let paid = PAID_STATES
            .iter()
            .any(|state| self.request(&CrmRequest::patch(path.clone(), json!({ "estado": state }))).is_some());
        if paid {
            tracing::info!(invoice_id, "Invoice marked as paid");
        } else {
            tracing::error!(invoice_id, "Failed to mark invoice as paid");
        }
        paid
    }
}

/// Strip a leading country code from numbers longer than a local number.
pub fn local_phone(phone: &str) -> &str {
    if phone.len() > LOCAL_PHONE_DIGITS {
        phone.strip_prefix(COUNTRY_CODE).unwrap_or(phone)
    } else {
        phone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::transport::{CrmMethod, ScriptedTransport};
    use std::sync::Mutex;

    /// Shares the scripted transport so tests can inspect recorded requests.
    struct Shared(Arc<ScriptedTransport>);

    impl CrmTransport for Shared {
        fn send(&self, request: &CrmRequest) -> Result<Value, CrmError> {
            self.0.send(request)
        }
    }

    fn scripted(transport: ScriptedTransport) -> (WispHubClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let client = WispHubClient::new(Box::new(Shared(transport.clone()))).with_sleeper(|_| {});
        (client, transport)
    }

    #[test]
    fn local_phone_strips_country_code() {
        assert_eq!(local_phone("51987654321"), "987654321");
        assert_eq!(local_phone("987654321"), "987654321");
        assert_eq!(local_phone("519876543"), "519876543");
    }

    #[test]
    fn phone_lookup_tries_local_number_first() {
        let transport = ScriptedTransport::new().respond_query(
            CrmMethod::Get,
            "/clientes/",
            &[("celular", "987654321")],
            json!({"results": [{"id_servicio": 42, "nombre": "Ana Torres"}]}),
        );
        let (client, transport) = scripted(transport);

        let customer = client.find_customer_by_phone("51987654321").unwrap();
        assert_eq!(customer.service_id(), Some(42));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn phone_lookup_falls_through_fields_and_numbers() {
        let transport = ScriptedTransport::new()
            .respond_query(CrmMethod::Get, "/clientes/", &[("celular", "987654321")], json!({"results": []}))
            .respond_query(CrmMethod::Get, "/clientes/", &[("celular", "51987654321")], json!({"results": []}))
            .respond_query(CrmMethod::Get, "/clientes/", &[("telefono", "987654321")], json!({"results": []}))
            .respond_query(
                CrmMethod::Get,
                "/clientes/",
                &[("telefono", "51987654321")],
                json!({"results": [{"id": 7}]}),
            );
        let (client, transport) = scripted(transport);

        let customer = client.find_customer_by_phone("51987654321").unwrap();
        assert_eq!(customer.service_id(), Some(7));

        let order: Vec<(String, String)> = transport
            .requests()
            .into_iter()
            .map(|r| r.query[0].clone())
            .collect();
        assert_eq!(
            order,
            vec![
                ("celular".to_string(), "987654321".to_string()),
                ("celular".to_string(), "51987654321".to_string()),
                ("telefono".to_string(), "987654321".to_string()),
                ("telefono".to_string(), "51987654321".to_string()),
            ]
        );
    }

    #[test]
    fn failing_requests_are_retried_then_give_up() {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let recorded = sleeps.clone();
        let transport = Arc::new(ScriptedTransport::new().fail(CrmMethod::Get, "/clientes/", 500));
        let client = WispHubClient::new(Box::new(Shared(transport.clone())))
            .with_sleeper(move |d| recorded.lock().unwrap().push(d));

        assert!(client.find_customer_by_name("Ana").is_none());
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn combined_lookup_falls_back_to_name() {
        let transport = ScriptedTransport::new()
            .respond_query(CrmMethod::Get, "/clientes/", &[("search", "Ana Torres")], json!({"results": [{"id_servicio": 5}]}))
            .respond(CrmMethod::Get, "/clientes/", json!({"results": []}));
        let (client, _) = scripted(transport);

        let customer = client.find_customer(Some("987654321"), Some("Ana Torres")).unwrap();
        assert_eq!(customer.service_id(), Some(5));
        assert!(client.find_customer(None, None).is_none());
    }

    #[test]
    fn code_lookup_requires_an_id() {
        let transport = ScriptedTransport::new()
            .respond(CrmMethod::Get, "/clientes/100/", json!({"id_servicio": 100, "nombre": "Luis"}))
            .respond(CrmMethod::Get, "/clientes/200/", json!({"detail": "x"}));
        let (client, _) = scripted(transport);

        assert_eq!(client.find_customer_by_code("100").unwrap().nombre.as_deref(), Some("Luis"));
        assert!(client.find_customer_by_code("200").is_none());
    }

    #[test]
    fn debt_uses_nested_endpoint_when_flat_fails() {
        let transport = ScriptedTransport::new()
            .fail(CrmMethod::Get, "/facturas/", 500)
            .respond(
                CrmMethod::Get,
                "/clientes/42/facturas/",
                json!({"results": [{"id": 9001, "total": "60.00"}, {"id": 9002, "total": 15.5}]}),
            );
        let (client, _) = scripted(transport);

        let debt = client.pending_debt(42);
        assert!(debt.has_debt);
        assert_eq!(debt.amount, 75.5);
        assert_eq!(debt.invoice_id, Some(9001));
    }

    #[test]
    fn empty_flat_result_means_no_debt() {
        let transport = ScriptedTransport::new()
            .respond(CrmMethod::Get, "/facturas/", json!({"results": []}));
        let (client, transport) = scripted(transport);

        assert_eq!(client.pending_debt(42), DebtSummary::none());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn payment_registration_payload() {
        let transport = ScriptedTransport::new()
            .respond(CrmMethod::Post, "/pagos/", json!({"id": 777}));
        let (client, transport) = scripted(transport);

        let record = PaymentRecord {
            amount: Some(50.0),
            date: Some("2024-10-03".into()),
            payment_method: Some("Yape".into()),
            operation_code: Some("123456".into()),
            customer_phone: Some("987654321".into()),
        };
        let outcome = client.register_payment(42, &record);
        assert!(outcome.success);
        assert_eq!(outcome.response, Some(json!({"id": 777})));

        let sent = transport.requests();
        let body = sent[0].body.as_ref().unwrap();
        assert_eq!(body["id_servicio"], 42);
        assert_eq!(body["cliente"], 42);
        assert_eq!(body["monto"], 50.0);
        assert_eq!(body["fecha_pago"], "2024-10-03");
        assert_eq!(body["observacion"], "Pago automatico - Yape - Op: 123456 - Tel: 987654321");
    }

    #[test]
    fn payment_registration_failure_message() {
        let (client, transport) = scripted(ScriptedTransport::new());
        let outcome = client.register_payment(42, &PaymentRecord::default());
        assert!(!outcome.success);
        assert_eq!(outcome.message, PAYMENT_FAILED_MESSAGE);
        // 3 attempts on /pagos/ + 3 on /clientes/42/pagos/
        assert_eq!(transport.requests().len(), 6);
        assert_eq!(transport.requests()[5].path, "/clientes/42/pagos/");
    }

    #[test]
    fn mark_paid_tries_second_state() {
        struct RejectPagado;
        impl CrmTransport for RejectPagado {
            fn send(&self, request: &CrmRequest) -> Result<Value, CrmError> {
                match request.body.as_ref().and_then(|b| b["estado"].as_str()) {
                    Some("pagada") => Ok(json!({"estado": "pagada"})),
                    _ => Err(CrmError::Status { status: 400, body: String::new() }),
                }
            }
        }
        let client = WispHubClient::new(Box::new(RejectPagado)).with_sleeper(|_| {});
        assert!(client.mark_invoice_paid(9001));

        let (client, transport) = scripted(ScriptedTransport::new());
        assert!(!client.mark_invoice_paid(9001));
        // 3 attempts per state
        assert_eq!(transport.requests().len(), 6);
    }
}
