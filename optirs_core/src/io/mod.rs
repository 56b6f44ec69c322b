//! Module for converting external, untyped problem descriptions into the
//! crate's typed request and model structures
pub mod monte_carlo;
pub mod request;
pub mod validate;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors arising while reading external input
#[derive(Error, Debug)]
pub enum IoError {
    /// The request payload could not be deserialized into the typed request
    #[error("unable to parse request: {0}")]
    Deserialize(String),
}

/// Parse a JSON request payload into one of the typed request structures
pub fn parse_request<T: DeserializeOwned>(json: &str) -> Result<T, IoError> {
    serde_json::from_str(json).map_err(|e| IoError::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::request::AllocationRequest;
    use super::*;

    #[test]
    fn parse_errors_are_structured() {
        let result: Result<AllocationRequest, IoError> = parse_request("{not json");
        assert!(matches!(result, Err(IoError::Deserialize(_))));
    }
}
