//! Mobile-money capture gateway
//!
//! The checkout orchestrator talks to the provider through the
//! [`PaymentProvider`] trait so tests can swap in the mock. The live
//! client wraps the gateway's HTTP API; initiation runs inside the
//! checkout unit of work so a gateway failure rolls the whole checkout
//! back.

use crate::config::ProviderConfig;
use crate::errors::{PaymentsError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CaptureRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    /// "mobile_money_mtn" or "mobile_money_orange"
    pub payment_method: String,
    pub phone_number: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureResponse {
    /// Provider-side reference for later verification
    pub reference: String,
    pub status: CaptureStatus,
    pub provider_fee: Option<Decimal>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Start a capture against the buyer's mobile-money account.
    async fn initiate(&self, request: &CaptureRequest) -> Result<CaptureResponse>;

    /// Look up the current state of a previously initiated capture.
    async fn status(&self, reference: &str) -> Result<CaptureResponse>;
}

/// HTTP client for the mobile-money gateway.
pub struct MobileMoneyProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MobileMoneyProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentsError::Configuration(format!("provider client: {}", e)))?;

        Ok(MobileMoneyProvider {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentProvider for MobileMoneyProvider {
    async fn initiate(&self, request: &CaptureRequest) -> Result<CaptureResponse> {
        info!(
            "Initiating {} capture of {} {} for order {}",
            request.payment_method, request.amount, request.currency, request.order_id
        );

        let response = self
            .client
            .post(format!("{}/v1/captures", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentsError::PaymentInitiationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Capture initiation rejected ({}): {}", status, body);
            return Err(PaymentsError::PaymentInitiationFailed(format!(
                "gateway returned {}",
                status
            )));
        }

        response
            .json::<CaptureResponse>()
            .await
            .map_err(|e| PaymentsError::PaymentInitiationFailed(e.to_string()))
    }

    async fn status(&self, reference: &str) -> Result<CaptureResponse> {
        let response = self
            .client
            .get(format!("{}/v1/captures/{}", self.base_url, reference))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PaymentsError::PaymentInitiationFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentsError::TransactionNotFound(reference.to_string()));
        }

        response
            .json::<CaptureResponse>()
            .await
            .map_err(|e| PaymentsError::PaymentInitiationFailed(e.to_string()))
    }
}

/// In-process stand-in for the gateway, used in tests and development.
pub struct MockPaymentProvider {
    pub fail_initiation: bool,
    pub capture_status: CaptureStatus,
    pub provider_fee: Option<Decimal>,
}

impl MockPaymentProvider {
    pub fn succeeding() -> Self {
        MockPaymentProvider {
            fail_initiation: false,
            capture_status: CaptureStatus::Completed,
            provider_fee: None,
        }
    }

    pub fn failing() -> Self {
        MockPaymentProvider {
            fail_initiation: true,
            capture_status: CaptureStatus::Failed,
            provider_fee: None,
        }
    }

    pub fn pending() -> Self {
        MockPaymentProvider {
            fail_initiation: false,
            capture_status: CaptureStatus::Pending,
            provider_fee: None,
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn initiate(&self, request: &CaptureRequest) -> Result<CaptureResponse> {
        if self.fail_initiation {
            return Err(PaymentsError::PaymentInitiationFailed(
                "mock gateway unavailable".to_string(),
            ));
        }

        Ok(CaptureResponse {
            reference: format!("MOCK-{}", Uuid::new_v4().simple()),
            status: CaptureStatus::Pending,
            provider_fee: self.provider_fee,
        })
    }

    async fn status(&self, reference: &str) -> Result<CaptureResponse> {
        Ok(CaptureResponse {
            reference: reference.to_string(),
            status: self.capture_status,
            provider_fee: self.provider_fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CaptureRequest {
        CaptureRequest {
            order_id: Uuid::new_v4(),
            amount: Decimal::from(5000),
            currency: "XAF".to_string(),
            payment_method: "mobile_money_mtn".to_string(),
            phone_number: Some("+237670000000".to_string()),
            description: "Order payment".to_string(),
        }
    }

    #[actix_rt::test]
    async fn test_mock_initiation_succeeds() {
        let provider = MockPaymentProvider::succeeding();
        let response = provider.initiate(&request()).await.unwrap();
        assert!(response.reference.starts_with("MOCK-"));
        assert_eq!(response.status, CaptureStatus::Pending);
    }

    #[actix_rt::test]
    async fn test_mock_initiation_failure() {
        let provider = MockPaymentProvider::failing();
        let err = provider.initiate(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentsError::PaymentInitiationFailed(_)));
    }

    #[actix_rt::test]
    async fn test_mock_status_reflects_configured_outcome() {
        let provider = MockPaymentProvider::succeeding();
        let response = provider.status("MOCK-ref").await.unwrap();
        assert_eq!(response.status, CaptureStatus::Completed);

        let provider = MockPaymentProvider::pending();
        let response = provider.status("MOCK-ref").await.unwrap();
        assert_eq!(response.status, CaptureStatus::Pending);
    }
}
