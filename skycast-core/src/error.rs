use thiserror::Error;

/// Failures surfaced by the weather gateway. Variants carry owned strings
/// so the error can live inside a published request state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("location not found: {0}")]
    NotFound(String),

    #[error("rate limited by the weather provider")]
    RateLimited,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::MalformedResponse(err.to_string())
        } else {
            GatewayError::NetworkFailure(err.to_string())
        }
    }
}

/// Failures attached to a query slot: either the query was rejected
/// before any network call, or the gateway failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl QueryError {
    /// Short user-facing message, one per error kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "Enter a city name to search.",
            QueryError::Gateway(GatewayError::NotFound(_)) => {
                "City not found. Check the spelling and try again."
            }
            QueryError::Gateway(GatewayError::RateLimited) => {
                "Too many requests. Wait a moment and try again."
            }
            QueryError::Gateway(GatewayError::NetworkFailure(_)) => {
                "Unable to reach the weather service. Check your connection."
            }
            QueryError::Gateway(GatewayError::MalformedResponse(_)) => {
                "The weather service returned an unexpected response."
            }
        }
    }
}
