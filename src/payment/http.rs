use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::health::{ComponentHealth, HealthStatus};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

use super::{
    ChargeReceipt, ChargeRequest, ChargeStatus, PaymentError, PaymentGateway, RefundReceipt,
    RefundRequest,
};

// ============================================================================
// HTTP Payment Gateway
// ============================================================================
//
// JSON over HTTP:
//   POST {base}/charges  ChargeRequest → { code, transaction_token?, message? }
//   POST {base}/refunds  RefundRequest → { code, refund_reference?, message? }
//
// code "SUCCESS" is a success; "ORDERPAID" on a charge means the provider
// already holds a payment for the order number. Any other code is a decline.
// Connection errors, timeouts and 5xx responses are transient; 4xx responses
// are declines. Only transient failures count against the circuit breaker.
//
// ============================================================================

const SUCCESS: &str = "SUCCESS";
const ORDER_PAID: &str = "ORDERPAID";

#[derive(Debug, Deserialize)]
struct ProviderChargeResponse {
    code: String,
    transaction_token: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderRefundResponse {
    code: String,
    refund_reference: Option<String>,
    message: Option<String>,
}

pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    circuit_breaker: CircuitBreaker,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Transient(format!("failed to build HTTP client: {}", e)))?;

        // Open after 5 consecutive transient failures, try again after 30s
        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
            success_threshold: 2,
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            circuit_breaker: CircuitBreaker::new("payment_gateway", cb_config),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, PaymentError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);

        // Declines travel in the Ok branch so they do not trip the breaker
        let result = self
            .circuit_breaker
            .call(async {
                let response = self
                    .client
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| PaymentError::Transient(e.to_string()))?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(PaymentError::Transient(format!("provider returned {}", status)));
                }
                if status.is_client_error() {
                    let text = response.text().await.unwrap_or_default();
                    return Ok(Err(PaymentError::Declined(format!("{}: {}", status, text))));
                }

                response
                    .json::<R>()
                    .await
                    .map(Ok::<R, PaymentError>)
                    .map_err(|e| PaymentError::Transient(format!("malformed provider response: {}", e)))
            })
            .await;

        match result {
            Ok(inner) => inner,
            Err(CircuitBreakerError::CircuitOpen(_)) => {
                tracing::error!(url = %url, "Circuit breaker open - payment provider unavailable");
                Err(PaymentError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, url = %url, "Payment provider call failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        let response: ProviderChargeResponse = self.post("charges", request).await?;

        match response.code.as_str() {
            SUCCESS => {
                tracing::info!(order_number = %request.order_number, "💳 Charge accepted by provider");
                Ok(ChargeReceipt {
                    status: ChargeStatus::Paid,
                    transaction_token: response.transaction_token,
                })
            }
            ORDER_PAID => {
                tracing::info!(order_number = %request.order_number, "Provider reports order already paid");
                Ok(ChargeReceipt {
                    status: ChargeStatus::AlreadyPaid,
                    transaction_token: response.transaction_token,
                })
            }
            other => Err(PaymentError::Declined(
                response.message.unwrap_or_else(|| other.to_string()),
            )),
        }
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundReceipt, PaymentError> {
        let response: ProviderRefundResponse = self.post("refunds", request).await?;

        if response.code == SUCCESS {
            Ok(RefundReceipt {
                refund_reference: response
                    .refund_reference
                    .unwrap_or_else(|| request.refund_reference.clone()),
            })
        } else {
            Err(PaymentError::Declined(
                response.message.unwrap_or(response.code),
            ))
        }
    }

    async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.get_state().await
    }

    async fn health(&self) -> ComponentHealth {
        let state = self.circuit_state().await;
        let status = match state {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => {
                HealthStatus::Degraded("Circuit breaker half-open".to_string())
            }
            CircuitState::Open => HealthStatus::Unhealthy("Circuit breaker open".to_string()),
        };
        ComponentHealth::new("payment_gateway", status).with_details(self.base_url.clone())
    }
}
