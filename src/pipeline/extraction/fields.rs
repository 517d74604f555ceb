//! Pattern-based field extraction from recognized receipt text.
//!
//! Every field has an ordered table of compiled patterns; the first pattern
//! that yields a usable value wins. Extractors never fail: no match is `None`.

use std::sync::LazyLock;

use regex::Regex;

use super::types::FieldSet;

// ═══════════════════════════════════════════════════════════
// Providers
// ═══════════════════════════════════════════════════════════

/// Payment providers and channels recognized on Peruvian receipts, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Yape,
    Plin,
    Bcp,
    Interbank,
    Bbva,
    Scotiabank,
    BanBif,
    BancoDeLaNacion,
    Tarjeta,
    Transferencia,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Yape => "Yape",
            Provider::Plin => "Plin",
            Provider::Bcp => "BCP",
            Provider::Interbank => "Interbank",
            Provider::Bbva => "BBVA",
            Provider::Scotiabank => "Scotiabank",
            Provider::BanBif => "BanBif",
            Provider::BancoDeLaNacion => "Banco de la Nacion",
            Provider::Tarjeta => "Tarjeta",
            Provider::Transferencia => "Transferencia",
        }
    }

    /// Payment channel: wallets keep their name, cards are "Tarjeta",
    /// every other bank is a "Transferencia".
    pub fn payment_method(&self) -> &'static str {
        match self {
            Provider::Yape => "Yape",
            Provider::Plin => "Plin",
            Provider::Tarjeta => "Tarjeta",
            _ => "Transferencia",
        }
    }
}

struct ProviderPatterns {
    provider: Provider,
    patterns: Vec<Regex>,
}

fn pattern(regex_str: &str) -> Regex {
    Regex::new(regex_str).expect("Invalid receipt regex pattern")
}

fn provider(provider: Provider, regexes: &[&str]) -> ProviderPatterns {
    ProviderPatterns {
        provider,
        patterns: regexes.iter().map(|r| pattern(r)).collect(),
    }
}

/// Generic "Transferencia" must stay last: most bank receipts also mention it.
static PROVIDER_PATTERNS: LazyLock<Vec<ProviderPatterns>> = LazyLock::new(|| {
    vec![
        provider(Provider::Yape, &[r"(?i)\byape\b", r"(?i)\byapeo\b", r"(?i)\byapeaste\b"]),
        provider(Provider::Plin, &[r"(?i)\bplin\b"]),
        provider(Provider::Bcp, &[r"(?i)\bbcp\b", r"(?i)banco\s*de\s*cr[eé]dito"]),
        provider(Provider::Interbank, &[r"(?i)\binterbank\b"]),
        provider(Provider::Bbva, &[r"(?i)\bbbva\b", r"(?i)\bcontinental\b"]),
        provider(Provider::Scotiabank, &[r"(?i)\bscotiabank\b"]),
        provider(Provider::BanBif, &[r"(?i)\bbanbif\b"]),
        provider(Provider::BancoDeLaNacion, &[r"(?i)banco\s*de\s*la\s*naci[oó]n"]),
        provider(
            Provider::Tarjeta,
            &[
                r"(?i)tarjeta\s*(de\s*)?(cr[eé]dito|d[eé]bito)",
                r"(?i)\bvisa\b",
                r"(?i)\bmastercard\b",
            ],
        ),
        provider(
            Provider::Transferencia,
            &[r"(?i)transferencia\s*(bancaria)?", r"(?i)\btransferencia\b"],
        ),
    ]
});

// ═══════════════════════════════════════════════════════════
// Field pattern tables
// ═══════════════════════════════════════════════════════════

/// Thousands-grouped soles amount (`S/ 1,250.00`); commas are grouping, not decimals.
static GROUPED_AMOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"S/\.?\s*(\d{1,3}(?:,\d{3})+\.\d{2})\b"));

static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"S/\.?\s*(\d{1,6}[.,]\d{2})"),
        pattern(r"S/\.?\s*(\d{1,6})"),
        pattern(r"PEN\s*(\d{1,6}[.,]\d{2})"),
        pattern(r"(\d{1,6}[.,]\d{2})\s*(?:soles|PEN)"),
        pattern(r"(?:monto|importe|total|pagaste|recibido|enviaste)\s*:?\s*S?/?\.?\s*(\d{1,6}[.,]\d{2})"),
        pattern(r"USD?\s*\$?\s*(\d{1,6}[.,]\d{2})"),
    ]
});

static OPERATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"(?:N[°ºo]?\s*(?:de\s*)?(?:operaci[oó]n|transacci[oó]n|referencia|pedido))\s*:?\s*(\w{4,20})"),
        pattern(r"(?:C[oó]digo|Code)\s*:?\s*(\w{4,20})"),
        pattern(r"(?:operaci[oó]n|transacci[oó]n)\s*:?\s*#?\s*(\w{4,20})"),
        pattern(r"(?:N[°ºo]?\s*operaci[oó]n)\s*:?\s*(\d{6,20})"),
        pattern(r"(?:CodOpe|Op\.?)\s*:?\s*(\d{6,20})"),
        pattern(r"#(\d{8,20})"),
    ]
});

/// Already-normalized `YYYY-MM-DD`; checked first so normalization is idempotent.
static ISO_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"));

/// `D/M/Y` or `D-M-Y` with a 2- or 4-digit year.
static NUMERIC_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})\b"));

/// `15 de marzo de 2024`, `15 de marzo 2024`
static SPELLED_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(\d{1,2})\s*de\s*(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)\s*(?:de\s*)?(\d{4}|\d{2})",
    )
});

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Seconds-bearing time first. Trailing am/pm/hrs markers are consumed but not interpreted.
static TIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"(\d{1,2}):(\d{2}):(\d{2})"),
        pattern(r"(\d{1,2}):(\d{2})\s*(?:hrs?|a\.?m\.?|p\.?m\.?|horas)?"),
    ]
});

static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"(?:celular|tel[eé]fono|m[oó]vil|cel)\s*:?\s*(\d{9})"),
        pattern(r"\b(9\d{8})\b"),
    ]
});

static LAST_DIGITS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"\*{2,}(\d{4})"),
        pattern(r"(?:terminada?\s*en|ending)\s*(\d{4})"),
        pattern(r"(?:cuenta|tarjeta)\s*\*+(\d{4})"),
    ]
});

/// Name words are joined by horizontal whitespace only, so a name never runs into the next line's label.
static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![pattern(
        r"(?:De|Para|Enviado\s*a|Recibido\s*de|Pagador|Destinatario|Nombre)\s*:?\s*([A-ZÁÉÍÓÚÑ][a-záéíóúñ]+(?:[ \t]+[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+){1,4})",
    )]
});

// ═══════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════

/// Run every extractor over `text`.
pub fn extract_fields(text: &str) -> FieldSet {
    let provider = detect_provider(text);
    let amount = extract_amount(text);
    let (payer_name, receiver_name) = extract_names(text);

    FieldSet {
        bank: provider.map(|p| p.as_str().to_string()),
        payment_method: provider.map(|p| p.payment_method().to_string()),
        amount: amount.map(|(value, _)| value),
        currency: Some(
            amount
                .map(|(_, currency)| currency)
                .unwrap_or(DEFAULT_CURRENCY)
                .to_string(),
        ),
        operation_code: extract_operation_code(text),
        date: extract_date(text),
        time: extract_time(text),
        phone: extract_phone(text),
        last_digits: extract_last_digits(text),
        payer_name,
        receiver_name,
    }
}

pub const DEFAULT_CURRENCY: &str = "PEN";

/// First provider category with any matching pattern.
pub fn detect_provider(text: &str) -> Option<Provider> {
    PROVIDER_PATTERNS
        .iter()
        .find(|entry| entry.patterns.iter().any(|re| re.is_match(text)))
        .map(|entry| entry.provider)
}

/// Amount plus currency. Currency is "USD" when the text mentions dollars, else "PEN".
pub fn extract_amount(text: &str) -> Option<(f64, &'static str)> {
    let grouped = GROUPED_AMOUNT_PATTERN
        .captures(text)
        .and_then(|caps| parse_amount(&caps[1].replace(',', "")));

    let amount = grouped.or_else(|| {
        AMOUNT_PATTERNS.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| parse_amount(&caps[1].replace(',', ".")))
        })
    })?;

    Some((amount, detect_currency(text)))
}

fn parse_amount(s: &str) -> Option<f64> {
    s.parse::<f64>()
        .ok()
        .map(|v| (v * 100.0).round() / 100.0)
}

fn detect_currency(text: &str) -> &'static str {
    if text.contains("USD") || text.contains("US$") || text.to_lowercase().contains("dólar") {
        "USD"
    } else {
        DEFAULT_CURRENCY
    }
}

pub fn extract_operation_code(text: &str) -> Option<String> {
    first_capture(&OPERATION_PATTERNS, text)
}

/// Date as zero-padded `YYYY-MM-DD`.
///
/// Numeric dates are read day-first; day and month are swapped only when the
/// month slot exceeds 12. Two-digit years are taken as 20YY.
pub fn extract_date(text: &str) -> Option<String> {
    if let Some(date) = ISO_DATE_PATTERN.captures_iter(text).find_map(|caps| {
        format_date(&caps[1], caps[2].parse().ok()?, caps[3].parse().ok()?)
    }) {
        return Some(date);
    }

    if let Some(date) = NUMERIC_DATE_PATTERN.captures_iter(text).find_map(|caps| {
        let mut day: u32 = caps[1].parse().ok()?;
        let mut month: u32 = caps[2].parse().ok()?;
        if month > 12 {
            std::mem::swap(&mut day, &mut month);
        }
        format_date(&caps[3], month, day)
    }) {
        return Some(date);
    }

    SPELLED_DATE_PATTERN.captures_iter(text).find_map(|caps| {
        let month_name = caps[2].to_lowercase();
        let month = MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
        format_date(&caps[3], month, caps[1].parse().ok()?)
    })
}

fn format_date(year: &str, month: u32, day: u32) -> Option<String> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    let year = if year.len() == 2 {
        format!("20{year}")
    } else {
        year.to_string()
    };
    Some(format!("{year}-{month:02}-{day:02}"))
}

/// Time as zero-padded `HH:MM:SS`; seconds default to `00`.
pub fn extract_time(text: &str) -> Option<String> {
    TIME_PATTERNS.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            let second: u32 = match caps.get(3) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };
            if hour > 23 || minute > 59 || second > 59 {
                return None;
            }
            Some(format!("{hour:02}:{minute:02}:{second:02}"))
        })
    })
}

pub fn extract_phone(text: &str) -> Option<String> {
    first_capture(&PHONE_PATTERNS, text)
}

pub fn extract_last_digits(text: &str) -> Option<String> {
    first_capture(&LAST_DIGITS_PATTERNS, text)
}

/// Labeled names in text order: the first is the payer, the second the receiver.
pub fn extract_names(text: &str) -> (Option<String>, Option<String>) {
    let mut names = NAME_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(text).map(|caps| caps[1].to_string()));
    let payer = names.next();
    let receiver = names.next();
    (payer, receiver)
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text).map(|caps| caps[1].to_string()))
}
