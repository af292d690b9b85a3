// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! LLM client implementations for toolflow.
//!
//! This module provides implementations of the [`LlmClient`] trait:
//!
//! - [`gemini::GeminiClient`] - Google Gemini models via the Generate Content API
//!
//! # Quick Start
//!
//! Just set an environment variable and go:
//!
//! ```bash
//! export GEMINI_API_KEY=your-key
//! ```
//!
//! Then in code:
//!
//! ```rust,ignore
//! use toolflow::config::Settings;
//! use toolflow::llm::create_client;
//!
//! let mut settings = Settings::new();
//! settings.apply_env()?;
//! let llm = create_client(&settings)?;
//! let reply = llm.complete("What is the capital of France?").await?;
//! ```

pub mod gemini;

pub use gemini::GeminiClient;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::LlmError;
use crate::types::{LlmClient, SharedLlm};

/// Create a client from resolved settings.
///
/// # Errors
///
/// Returns [`LlmError::NotConfigured`] when no API key is available.
pub fn create_client(settings: &Settings) -> Result<SharedLlm, LlmError> {
    let api_key = settings.gemini_api_key.clone().ok_or_else(|| {
        LlmError::NotConfigured(
            "GEMINI_API_KEY not set. Export it or add gemini_api_key to the config file."
                .to_string(),
        )
    })?;

    Ok(Arc::new(GeminiClient::new(api_key, settings.model.clone())))
}

/// Convenience function to create a Gemini client.
///
/// # Example
///
/// ```rust,ignore
/// let llm = gemini("your-key", "gemini-2.5-flash");
/// ```
pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> SharedLlm {
    Arc::new(GeminiClient::new(api_key, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_missing_key() {
        let settings = Settings::new();
        let result = create_client(&settings);
        match result {
            Err(LlmError::NotConfigured(message)) => {
                assert!(message.contains("GEMINI_API_KEY"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[test]
    fn test_create_client() {
        let settings = Settings {
            gemini_api_key: Some("test-key".to_string()),
            ..Default::default()
        };

        let client = create_client(&settings).unwrap();
        assert_eq!(client.model(), "gemini-2.5-flash");
    }

    #[test]
    fn test_convenience_function() {
        let client = gemini("key", "gemini-2.5-pro");
        assert_eq!(client.model(), "gemini-2.5-pro");
    }
}
