//! Callback payload model and signed-message construction.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{payload_error, Error, PayloadErrorKind};

pub const TXNID: &str = "txnid";
pub const REFNO: &str = "refno";
pub const STATUS: &str = "status";
pub const MESSAGE: &str = "message";
pub const AMOUNT: &str = "amount";
pub const SIGNATURE: &str = "signature";
pub const DIGEST: &str = "digest";

/// Fields covered by a `signature`, in signing order. The amount is normalized
/// with [`format_amount`] before it is joined.
pub const SIGNED_FIELDS: [&str; 5] = [TXNID, REFNO, STATUS, MESSAGE, AMOUNT];

/// Fields covered by a legacy `digest`, in digest order. The merchant password
/// is appended after them.
pub const DIGEST_FIELDS: [&str; 4] = [TXNID, REFNO, STATUS, MESSAGE];

/// Fields sent by the gateway on a callback or postback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CallbackPayload {
    fields: HashMap<String, String>,
}

/// How a payload claims to be authenticated, decided once from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind<'a> {
    /// `signature` is present; it takes precedence over `digest`.
    Hmac { signature: &'a str },
    /// Only `digest` is present.
    Legacy { digest: &'a str },
    /// Neither is present.
    Unknown,
}

impl CallbackPayload {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Classify the payload by which authenticator field it carries.
    pub fn signature_kind(&self) -> SignatureKind<'_> {
        if let Some(signature) = self.get(SIGNATURE) {
            SignatureKind::Hmac { signature }
        } else if let Some(digest) = self.get(DIGEST) {
            SignatureKind::Legacy { digest }
        } else {
            SignatureKind::Unknown
        }
    }

    /// Names from `required` that are absent, in the order given.
    pub fn missing<'n>(&self, required: &[&'n str]) -> Vec<&'n str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect()
    }

    /// A required field, or a `MissingField` error naming it.
    pub fn require(&self, name: &str) -> Result<&str, Error> {
        self.get(name).ok_or_else(|| {
            payload_error(
                PayloadErrorKind::MissingField,
                &format!("Missing callback field: {}", name),
            )
        })
    }

    /// Values covered by a `signature`, with the amount normalized.
    ///
    /// # Returns
    ///
    /// `[txnid, refno, status, message, amount]`, or an error if a field is
    /// missing or the amount is not numeric.
    pub fn signed_fields(&self) -> Result<[String; 5], Error> {
        Ok([
            self.require(TXNID)?.to_string(),
            self.require(REFNO)?.to_string(),
            self.require(STATUS)?.to_string(),
            self.require(MESSAGE)?.to_string(),
            format_amount(self.require(AMOUNT)?)?,
        ])
    }

    /// The `:`-joined message signed by the gateway.
    pub fn signed_message(&self) -> Result<String, Error> {
        Ok(self.signed_fields()?.join(":"))
    }
}

impl From<HashMap<String, String>> for CallbackPayload {
    fn from(fields: HashMap<String, String>) -> Self {
        Self::new(fields)
    }
}

impl<K, V> FromIterator<(K, V)> for CallbackPayload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Format an amount with exactly two decimals, `.` as separator and no grouping.
///
/// Plain decimal text is rounded half away from zero on its digits, so the
/// result does not depend on binary floating point. Other numeric forms
/// (exponents) go through `f64`. A result of zero never carries a sign.
pub fn format_amount(raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim();
    let value: f64 = trimmed.parse().map_err(|_| malformed_amount(raw))?;
    if !value.is_finite() {
        return Err(malformed_amount(raw));
    }

    if let Some(formatted) = round_decimal_text(trimmed) {
        return Ok(formatted);
    }

    let formatted = format!("{:.2}", value);
    Ok(match formatted.strip_prefix('-') {
        Some(unsigned) if unsigned == "0.00" => unsigned.to_string(),
        _ => formatted,
    })
}

fn malformed_amount(raw: &str) -> Error {
    payload_error(
        PayloadErrorKind::MalformedInput,
        &format!("Amount is not numeric: {:?}", raw),
    )
}

fn round_decimal_text(text: &str) -> Option<String> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let digit = |i: usize| fraction.as_bytes().get(i).map_or(0, |b| u128::from(b - b'0'));

    let mut cents = whole.checked_mul(100)?.checked_add(digit(0) * 10 + digit(1))?;
    if digit(2) >= 5 {
        cents = cents.checked_add(1)?;
    }

    let sign = if negative && cents != 0 { "-" } else { "" };
    Some(format!("{}{}.{:02}", sign, cents / 100, cents % 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, &str)]) -> CallbackPayload {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_signature_takes_precedence_over_digest() {
        let p = payload(&[(SIGNATURE, "abc"), (DIGEST, "def")]);
        assert_eq!(p.signature_kind(), SignatureKind::Hmac { signature: "abc" });
    }

    #[test]
    fn test_digest_only_is_legacy() {
        let p = payload(&[(DIGEST, "def")]);
        assert_eq!(p.signature_kind(), SignatureKind::Legacy { digest: "def" });
    }

    #[test]
    fn test_no_authenticator_is_unknown() {
        let p = payload(&[(TXNID, "TXN001")]);
        assert_eq!(p.signature_kind(), SignatureKind::Unknown);
    }

    #[test]
    fn test_missing_preserves_order() {
        let p = payload(&[(TXNID, "TXN001"), (STATUS, "S")]);
        assert_eq!(p.missing(&SIGNED_FIELDS), vec![REFNO, MESSAGE, AMOUNT]);
    }

    #[test]
    fn test_signed_message_uses_fixed_order() {
        let p = payload(&[
            (AMOUNT, "100"),
            (MESSAGE, "OK"),
            (STATUS, "S"),
            (REFNO, "REF001"),
            (TXNID, "TXN001"),
        ]);
        assert_eq!(p.signed_message().unwrap(), "TXN001:REF001:S:OK:100.00");
    }

    #[test]
    fn test_signed_message_missing_field() {
        let p = payload(&[(TXNID, "TXN001")]);
        let err = p.signed_message().unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::ErrorKind::Payload(PayloadErrorKind::MissingField)
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount("100").unwrap(), "100.00");
        assert_eq!(format_amount("100.5").unwrap(), "100.50");
        assert_eq!(format_amount("1234567.891").unwrap(), "1234567.89");
        assert_eq!(format_amount("1.005").unwrap(), "1.01");
        assert_eq!(format_amount("0.995").unwrap(), "1.00");
        assert_eq!(format_amount(".5").unwrap(), "0.50");
        assert_eq!(format_amount(" 42 ").unwrap(), "42.00");
        assert_eq!(format_amount("-12.345").unwrap(), "-12.35");
        assert_eq!(format_amount("-0.001").unwrap(), "0.00");
        assert_eq!(format_amount("1e2").unwrap(), "100.00");
    }

    #[test]
    fn test_format_amount_rejects_non_numeric() {
        for raw in ["", "abc", "1,000.00", "NaN", "inf"] {
            let err = format_amount(raw).unwrap_err();
            assert_eq!(
                err.error_kind,
                crate::ErrorKind::Payload(PayloadErrorKind::MalformedInput),
                "{:?} should be malformed",
                raw
            );
        }
    }

    #[test]
    fn test_deserialize_from_json() {
        let p: CallbackPayload =
            serde_json::from_str(r#"{"txnid":"TXN001","digest":"abc"}"#).unwrap();
        assert_eq!(p.get(TXNID), Some("TXN001"));
        assert_eq!(p.signature_kind(), SignatureKind::Legacy { digest: "abc" });
    }
}
