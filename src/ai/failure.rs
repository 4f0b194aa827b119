//! Classification of non-success provider responses.
//!
//! Runs once, right next to the HTTP call. Callers above propagate the
//! resulting variant unchanged.

use crate::Error;
use reqwest::StatusCode;

/// Body fragments providers use when they refuse the uploaded picture.
const IMAGE_REJECTION_PHRASES: &[&str] = &[
    "could not process image",
    "invalid image",
    "unsupported image",
    "image_parse_error",
    "image format",
    "image exceeds",
    "invalid base64",
];

/// Body fragments that mean the account is out of money or quota.
const BILLING_PHRASES: &[&str] = &[
    "insufficient_quota",
    "credit balance",
    "billing",
    "exceeded your current quota",
];

fn mentions(body: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| body.contains(phrase))
}

pub fn classify(provider: &str, status: StatusCode, body: &str) -> Error {
    let lowered = body.to_ascii_lowercase();
    let detail = format!("{} API error (status {}): {}", provider, status, body);

    match status.as_u16() {
        429 if mentions(&lowered, BILLING_PHRASES) => Error::PaymentRequired(detail),
        429 => Error::RateLimited(detail),
        402 | 403 => Error::PaymentRequired(detail),
        401 => Error::Auth(detail),
        _ if mentions(&lowered, IMAGE_REJECTION_PHRASES) => Error::InvalidImageFormat(detail),
        _ if mentions(&lowered, BILLING_PHRASES) => Error::PaymentRequired(detail),
        _ => Error::AiProvider(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let err = classify("OpenAI", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[test]
    fn test_429_with_exhausted_quota_is_billing() {
        let body = r#"{"error":{"type":"insufficient_quota","message":"You exceeded your current quota"}}"#;
        let err = classify("OpenAI", StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, Error::PaymentRequired(_)));
    }

    #[test]
    fn test_402_and_403_are_billing() {
        assert!(matches!(
            classify("Anthropic", StatusCode::PAYMENT_REQUIRED, ""),
            Error::PaymentRequired(_)
        ));
        assert!(matches!(
            classify("Anthropic", StatusCode::FORBIDDEN, "forbidden"),
            Error::PaymentRequired(_)
        ));
    }

    #[test]
    fn test_401_is_auth() {
        let err = classify("OpenAI", StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_image_rejection_becomes_image_format_error() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"Could not process image"}}"#;
        let err = classify("Anthropic", StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, Error::InvalidImageFormat(_)));
    }

    #[test]
    fn test_low_credit_400_is_billing() {
        let body = "Your credit balance is too low to access the Anthropic API.";
        let err = classify("Anthropic", StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, Error::PaymentRequired(_)));
    }

    #[test]
    fn test_other_statuses_embed_the_status() {
        let err = classify("OpenAI", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        match err {
            Error::AiProvider(message) => assert!(message.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
