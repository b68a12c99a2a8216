use thiserror::Error;

pub type AttributionResult<T> = Result<T, AttributionError>;

#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unknown attribution model: {0}")]
    UnknownModel(String),

    #[error("Attribution calculation failed for contact {contact_id}: {message}")]
    Calculation { contact_id: String, message: String },

    #[error("Failed to sync to {platform}: {message}")]
    Sync { platform: String, message: String },

    #[error("{service}: {message}")]
    Authentication { service: String, message: String },

    #[error("Rate limit exceeded for {service}")]
    RateLimit {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Failed to connect to {service}: {message}")]
    Connection { service: String, message: String },

    #[error("{platform} did not respond within {timeout_ms}ms")]
    Timeout { platform: String, timeout_ms: u64 },

    #[error("Every platform failed for contact {contact_id}: {}", .failures.join("; "))]
    AllPlatformsFailed {
        contact_id: String,
        failures: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("CRM did not respond for contact {contact_id} within {timeout_ms}ms")]
    CrmTimeout { contact_id: String, timeout_ms: u64 },
}

impl AttributionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn calculation(contact_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Calculation {
            contact_id: contact_id.into(),
            message: message.into(),
        }
    }

    /// Transient transport failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let limited = AttributionError::RateLimit {
            service: "Facebook Ads".to_string(),
            retry_after_secs: Some(3600),
        };
        assert!(limited.is_retryable());

        let refused = AttributionError::Authentication {
            service: "LinkedIn Ads".to_string(),
            message: "Invalid or expired access token".to_string(),
        };
        assert!(!refused.is_retryable());
        assert!(!AttributionError::UnknownModel("bogus".to_string()).is_retryable());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = AttributionError::calculation("c-42", "touchpoint lookup failed");
        assert_eq!(
            err.to_string(),
            "Attribution calculation failed for contact c-42: touchpoint lookup failed"
        );

        let err = AttributionError::AllPlatformsFailed {
            contact_id: "c-42".to_string(),
            failures: vec!["google_ads: down".to_string(), "linkedin_ads: down".to_string()],
        };
        assert!(err.to_string().contains("google_ads: down; linkedin_ads: down"));

        let err = AttributionError::CrmTimeout {
            contact_id: "c-42".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "CRM did not respond for contact c-42 within 250ms");
        assert!(!err.is_retryable());
    }
}
