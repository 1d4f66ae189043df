use std::collections::BTreeMap;
use std::fmt;

use crate::gateway::models::{
    CallbackData, PaymentInitRequest, PaymentStatusRequest, PaymentVerifyRequest, RefundRequest,
};
use crate::utils::crypto::sanitize_card_number;

/// Rials.
pub const MIN_AMOUNT: i64 = 10_000;
pub const MAX_AMOUNT: i64 = 5_000_000_000;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_TOKEN_LEN: usize = 255;
pub const MAX_CALLBACK_STATUS_LEN: usize = 64;
pub const CARD_NUMBER_LEN: usize = 16;
pub const MOBILE_LEN: usize = 11;
pub const IBAN_DIGITS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Every violated field of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Records the error of a failed check, if any.
    pub fn check(&mut self, result: ValidationResult) {
        if let Err(error) = result {
            self.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|error| error.field == field)
    }

    /// Field to message. The first message wins when a field failed twice.
    pub fn field_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for error in &self.0 {
            map.entry(error.field.to_string())
                .or_insert_with(|| error.message.clone());
        }
        map
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("validation errors"),
            [single] => write!(f, "validation error: {single}"),
            many => write!(f, "validation errors ({} errors)", many.len()),
        }
    }
}

impl std::error::Error for ValidationErrors {}

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_amount(field: &'static str, amount: i64) -> ValidationResult {
    if amount < MIN_AMOUNT {
        return Err(ValidationError::new(
            field,
            format!("amount must be at least {} Rials", MIN_AMOUNT),
        ));
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::new(
            field,
            format!("amount must be at most {} Rials", MAX_AMOUNT),
        ));
    }

    Ok(())
}

/// Absolute http(s) URL with a host.
pub fn validate_callback_url(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;

    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ValidationError::new(
            field,
            "callback URL must be a valid HTTP(S) URL",
        )),
    }
}

/// `09` followed by nine digits.
pub fn validate_mobile(field: &'static str, value: &str) -> ValidationResult {
    let valid = value.len() == MOBILE_LEN
        && value.starts_with("09")
        && value.chars().all(|ch| ch.is_ascii_digit());

    if !valid {
        return Err(ValidationError::new(
            field,
            "mobile must be a valid Iranian mobile number (e.g., 09123456789)",
        ));
    }

    Ok(())
}

/// Sixteen digits once spaces and dashes are stripped.
pub fn validate_card_number(field: &'static str, value: &str) -> ValidationResult {
    let allowed = value
        .chars()
        .all(|ch| ch.is_ascii_digit() || ch == ' ' || ch == '-');

    if !allowed || sanitize_card_number(value).len() != CARD_NUMBER_LEN {
        return Err(ValidationError::new(
            field,
            "card number must be a 16-digit number",
        ));
    }

    Ok(())
}

/// `IR` followed by 24 digits.
pub fn validate_iban(iban: &str) -> ValidationResult {
    let valid = iban.len() == 2 + IBAN_DIGITS
        && iban.starts_with("IR")
        && iban[2..].chars().all(|ch| ch.is_ascii_digit());

    if !valid {
        return Err(ValidationError::new(
            "iban",
            "invalid IBAN format, must start with IR followed by 24 digits",
        ));
    }

    Ok(())
}

pub fn validate_token(field: &'static str, token: &str) -> ValidationResult {
    validate_required(field, token)?;
    validate_max_len(field, token, MAX_TOKEN_LEN)?;

    if token.chars().any(|ch| ch.is_control() || ch.is_whitespace()) {
        return Err(ValidationError::new(
            field,
            "must not contain whitespace or control characters",
        ));
    }

    Ok(())
}

/// Parses a user-entered amount such as `"1,250,000"` and checks its bounds.
pub fn parse_amount(raw: &str) -> Result<i64, ValidationError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let amount = digits
        .parse::<i64>()
        .map_err(|_| ValidationError::new("amount", "invalid amount format"))?;

    validate_amount("amount", amount)?;
    Ok(amount)
}

pub fn validate_payment_init(req: &PaymentInitRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    errors.check(validate_amount("amount", req.amount));

    match req.callback_url.as_deref() {
        None | Some("") => errors.push(ValidationError::new(
            "callback_url",
            "callback URL is required",
        )),
        Some(url) => errors.check(validate_callback_url("callback_url", url)),
    }

    if let Some(description) = &req.description {
        errors.check(validate_max_len(
            "description",
            description,
            MAX_DESCRIPTION_LEN,
        ));
    }

    if let Some(mobile) = req.mobile.as_deref().filter(|m| !m.is_empty()) {
        errors.check(validate_mobile("mobile", mobile));
    }

    if let Some(card) = req.valid_card_number.as_deref().filter(|c| !c.is_empty()) {
        errors.check(validate_card_number("valid_card_number", card));
    }

    errors.into_result()
}

pub fn validate_payment_verify(req: &PaymentVerifyRequest) -> Result<(), ValidationErrors> {
    validate_token("token", &req.token).map_err(ValidationErrors::from)
}

pub fn validate_payment_status(req: &PaymentStatusRequest) -> Result<(), ValidationErrors> {
    validate_token("token", &req.token).map_err(ValidationErrors::from)
}

pub fn validate_refund(req: &RefundRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    errors.check(validate_token("transaction_id", &req.transaction_id));

    if req.amount < 0 {
        errors.push(ValidationError::new(
            "amount",
            "amount must be a positive number",
        ));
    }

    errors.into_result()
}

pub fn validate_callback(data: &CallbackData) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    errors.check(validate_token("token", &data.token));
    errors.check(validate_required("status", &data.status));
    errors.check(validate_max_len("status", &data.status, MAX_CALLBACK_STATUS_LEN));

    errors.into_result()
}
