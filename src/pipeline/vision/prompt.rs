/// Fixed Spanish extraction instructions for the vision model.
///
/// The JSON keys here are the contract `parser::parse_vision_fields` reads.
pub const EXTRACTION_PROMPT: &str = r#"Analiza esta imagen de un comprobante de pago peruano.
Extrae los datos y responde SOLO con JSON valido, sin texto extra:

{
  "es_recibo_valido": true,
  "imagen_legible": true,
  "medio_pago": "Yape|Plin|BCP|Interbank|BBVA|Scotiabank|Transferencia|Tarjeta|Otro",
  "banco": "nombre del banco",
  "nombre_pagador": "nombre del que paga",
  "nombre_receptor": "nombre del que recibe",
  "monto": 0.00,
  "moneda": "PEN",
  "fecha": "YYYY-MM-DD",
  "hora": "HH:MM:SS",
  "codigo_operacion": "numero de operacion",
  "ultimos_4_digitos": null,
  "celular_emisor": null
}

Si no es un comprobante: es_recibo_valido=false. Si no ves un campo, usa null.
El monto debe ser numero decimal. NUNCA inventes datos."#;

/// Keys the model is asked to fill.
pub const PROMPT_KEYS: &[&str] = &[
    "es_recibo_valido",
    "imagen_legible",
    "medio_pago",
    "banco",
    "nombre_pagador",
    "nombre_receptor",
    "monto",
    "moneda",
    "fecha",
    "hora",
    "codigo_operacion",
    "ultimos_4_digitos",
    "celular_emisor",
];
