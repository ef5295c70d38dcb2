//! Configuration validation logic.

use super::TlsConfig;

type ValidationResult = Result<(), Box<dyn std::error::Error>>;

pub(super) fn validate_port(port: u16) -> ValidationResult {
    if port == 0 {
        return Err("PORT must be between 1 and 65535".into());
    }
    Ok(())
}

pub(super) fn validate_intake_capacity(capacity: usize) -> ValidationResult {
    if capacity == 0 {
        return Err("INTAKE_QUEUE_CAPACITY must be greater than 0".into());
    }
    Ok(())
}

pub(super) fn validate_collaborator_timeout(timeout_ms: u64) -> ValidationResult {
    if timeout_ms == 0 {
        return Err("COLLABORATOR_TIMEOUT_MS must be greater than 0".into());
    }
    Ok(())
}

pub(super) fn validate_max_concurrent_calls(limit: Option<usize>) -> ValidationResult {
    if limit == Some(0) {
        return Err("MAX_CONCURRENT_CALLS must be greater than 0 when set".into());
    }
    Ok(())
}

/// The lead webhook must be an absolute http(s) URL.
pub(super) fn validate_lead_webhook(url: Option<&str>) -> ValidationResult {
    let Some(url) = url else {
        return Ok(());
    };
    let parsed = url::Url::parse(url)
        .map_err(|e| format!("LEAD_WEBHOOK_URL is not a valid URL '{url}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("LEAD_WEBHOOK_URL must use http or https, got '{scheme}'").into()),
    }
}

/// Provider endpoints must parse and use the expected scheme family.
pub(super) fn validate_endpoint(name: &str, url: &str, schemes: &[&str]) -> ValidationResult {
    let parsed =
        url::Url::parse(url).map_err(|e| format!("{name} is not a valid URL '{url}': {e}"))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(format!(
            "{name} must use one of {:?}, got '{}'",
            schemes,
            parsed.scheme()
        )
        .into());
    }
    Ok(())
}

pub(super) fn validate_tls(tls: Option<&TlsConfig>) -> ValidationResult {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate file not found: {}",
            tls.cert_path.display()
        )
        .into());
    }
    if !tls.key_path.exists() {
        return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
    }
    Ok(())
}
