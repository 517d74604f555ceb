use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::extraction::ExtractionResult;

/// A WispHub customer (service) record. Unknown keys are preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id_servicio: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Customer {
    /// Service id, falling back to the plain record id.
    pub fn service_id(&self) -> Option<i64> {
        self.id_servicio.or(self.id)
    }
}

/// One invoice from `/facturas/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paginated list envelope used by WispHub.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Pending debt of one customer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DebtSummary {
    #[serde(rename = "tiene_deuda")]
    pub has_debt: bool,
    /// Sum of pending invoice totals, rounded to cents.
    #[serde(rename = "monto_deuda")]
    pub amount: f64,
    /// First pending invoice.
    #[serde(rename = "factura_id")]
    pub invoice_id: Option<i64>,
    #[serde(rename = "facturas")]
    pub invoices: Vec<Invoice>,
}

impl DebtSummary {
    pub fn none() -> Self {
        Self {
            has_debt: false,
            amount: 0.0,
            invoice_id: None,
            invoices: Vec::new(),
        }
    }

    pub fn from_invoices(invoices: Vec<Invoice>) -> Self {
        if invoices.is_empty() {
            return Self::none();
        }
        let total: f64 = invoices.iter().map(|i| i.total).sum();
        Self {
            has_debt: true,
            amount: (total * 100.0).round() / 100.0,
            invoice_id: invoices[0].id,
            invoices,
        }
    }
}

/// Payment facts to register, usually taken from an analyzed receipt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentRecord {
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub payment_method: Option<String>,
    pub operation_code: Option<String>,
    pub customer_phone: Option<String>,
}

impl PaymentRecord {
    pub fn from_extraction(result: &ExtractionResult, customer_phone: Option<&str>) -> Self {
        Self {
            amount: result.fields.amount,
            date: result.fields.date.clone(),
            payment_method: result.fields.payment_method.clone(),
            operation_code: result.fields.operation_code.clone(),
            customer_phone: customer_phone.map(str::to_string),
        }
    }

    /// Free-text note stored alongside the payment.
    pub fn observation(&self) -> String {
        format!(
            "Pago automatico - {} - Op: {} - Tel: {}",
            self.payment_method.as_deref().unwrap_or(""),
            self.operation_code.as_deref().unwrap_or(""),
            self.customer_phone.as_deref().unwrap_or(""),
        )
    }
}

/// Request body for `/pagos/`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentPayload {
    pub id_servicio: i64,
    pub cliente: i64,
    pub monto: Option<f64>,
    pub fecha_pago: String,
    pub medio_pago: Option<String>,
    pub codigo_operacion: Option<String>,
    pub observacion: String,
}

/// Outcome of a payment registration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

// ──────────────────────────────────────────────
// Lenient deserializers
// ──────────────────────────────────────────────

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    })
}
