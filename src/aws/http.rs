//! HTTP utilities for AWS JSON API calls

use crate::error::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;

/// Content type for AWS JSON protocol requests
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Header AWS services use to report the error type
const AMZ_ERROR_TYPE: &str = "x-amzn-errortype";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and masks potentially sensitive patterns
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        // back off to a char boundary so multi-byte text cannot panic
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..end],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Extract the AWS error code from the error-type header or the body's
/// `__type` field. The header form may carry a URI suffix after a colon,
/// the body form a namespace prefix before a `#`.
fn error_code(header: Option<&str>, body: &str) -> Option<String> {
    if let Some(header) = header {
        let code = header.split(':').next().unwrap_or(header).trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
    }

    let parsed: Value = serde_json::from_str(body).ok()?;
    let raw = parsed.get("__type").and_then(Value::as_str)?;
    Some(raw.rsplit('#').next().unwrap_or(raw).to_string())
}

/// Extract a human-readable message from an error body
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(message) = parsed
            .get("message")
            .or_else(|| parsed.get("Message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
    }
    sanitize_for_log(body)
}

/// HTTP client wrapper for AWS API calls
#[derive(Clone)]
pub struct AwsHttpClient {
    client: Client,
}

impl AwsHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("awstab/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Make an AWS JSON protocol call: POST with an `X-Amz-Target` header
    /// naming the operation. Non-2xx responses become [`Error::Api`] with
    /// the error code parsed from the wire.
    pub async fn post_target(
        &self,
        url: &str,
        target: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Value> {
        tracing::debug!("POST {} [{}]", url, target);

        let mut request = self
            .client
            .post(url)
            .header("X-Amz-Target", target)
            .header(CONTENT_TYPE, AMZ_JSON)
            .json(body);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        let error_type = response
            .headers()
            .get(AMZ_ERROR_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        if !status.is_success() {
            let code = error_code(error_type.as_deref(), &body);
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::warn!(
                "API error: {} {:?} - {}",
                status,
                code,
                sanitize_for_log(&body)
            );
            return Err(Error::Api {
                status: status.as_u16(),
                code,
                message: error_message(&body),
            });
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::decode("response JSON", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_prefers_header() {
        let code = error_code(
            Some("DoesNotExistException:http://internal.amazon.com/coral/"),
            r#"{"__type":"ignored#Other"}"#,
        );
        assert_eq!(code.as_deref(), Some("DoesNotExistException"));
    }

    #[test]
    fn error_code_falls_back_to_body_type() {
        let code = error_code(
            None,
            r#"{"__type":"com.amazonaws.iam#NoSuchEntity","message":"no such user"}"#,
        );
        assert_eq!(code.as_deref(), Some("NoSuchEntity"));
    }

    #[test]
    fn error_code_handles_unparseable_body() {
        assert_eq!(error_code(None, "<html>boom</html>"), None);
    }

    #[test]
    fn error_message_reads_either_casing() {
        assert_eq!(
            error_message(r#"{"Message":"denied"}"#),
            "denied".to_string()
        );
        assert_eq!(
            error_message(r#"{"message":"denied"}"#),
            "denied".to_string()
        );
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated, 500 bytes total"));
        assert!(sanitized.len() < body.len());
    }

    #[test]
    fn sanitize_truncates_multibyte_text_on_a_char_boundary() {
        // 'é' is two bytes; byte 200 falls inside one
        let body = format!("{}{}", "a".repeat(199), "é".repeat(20));
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains(&format!("truncated, {} bytes total", body.len())));

        let body = "é".repeat(150);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated, 300 bytes total"));
    }

    #[test]
    fn error_message_survives_long_multibyte_bodies() {
        let body = format!("{}{}", "a".repeat(199), "é".repeat(20));
        let message = error_message(&body);
        assert!(message.contains("truncated"));
    }
}
