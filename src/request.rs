use crate::chains::ChainType;
use crate::security::UrlValidator;
use crate::SummarizeError;
use serde::{Deserialize, Serialize};
use url::Url;

/// What the user asked for, as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub method: ChainType,
}

/// A request whose inputs passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub api_key: String,
    pub url: Url,
    pub method: ChainType,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SummarizeRequest {
    pub fn new(api_key: impl Into<String>, url: impl Into<String>, method: ChainType) -> Self {
        Self {
            api_key: Some(api_key.into()),
            url: Some(url.into()),
            method,
        }
    }

    /// Validate with the default URL policy
    pub fn validate(&self) -> Result<ValidatedRequest, SummarizeError> {
        self.validate_with(&UrlValidator::default())
    }

    /// The API key is checked first, then the URL's presence, then its shape.
    pub fn validate_with(&self, validator: &UrlValidator) -> Result<ValidatedRequest, SummarizeError> {
        let api_key = non_blank(&self.api_key).ok_or(SummarizeError::MissingApiKey)?;
        let url = non_blank(&self.url).ok_or(SummarizeError::MissingUrl)?;
        let url = validator.validate(url)?;

        Ok(ValidatedRequest {
            api_key: api_key.to_string(),
            url,
            method: self.method,
        })
    }
}
