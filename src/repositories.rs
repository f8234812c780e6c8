use serde_json::Value;

pub mod analytics;
pub mod users;

pub const GENERIC_FAILURE: &str = "The request could not be completed.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Backend { message: String },
    #[error("{assigned_contacts} contacts are still assigned to this user")]
    Conflict { assigned_contacts: u32 },
    #[error("bad response format: {0}")]
    BadResponse(String),
}

// Maps a non-success response body to the most specific error it encodes:
// a conflict payload, a server-supplied message, or the generic fallback.
pub fn error_from_body(body: &str) -> ApiError {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            return ApiError::Backend {
                message: GENERIC_FAILURE.to_string(),
            }
        }
    };

    if let Some(assigned) = parsed.get("assignedContacts").and_then(Value::as_u64) {
        return ApiError::Conflict {
            assigned_contacts: assigned as u32,
        };
    }

    let message = parsed
        .get("message")
        .or_else(|| parsed.get("error"))
        .and_then(Value::as_str)
        .unwrap_or(GENERIC_FAILURE);

    ApiError::Backend {
        message: message.to_string(),
    }
}
