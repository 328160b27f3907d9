use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

const STRIPE_CHARGES_URL: &str = "https://api.stripe.com/v1/charges";
const CURRENCY: &str = "inr";

#[derive(Debug, Clone)]
pub struct Charge {
    /// Whole rupees.
    pub amount: u64,
    /// Card token produced by the payment form.
    pub source: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded,
    Declined(String),
}

/// Payment capture. `Err` means the provider could not be reached or failed;
/// a card the provider refused is a normal `Declined` outcome.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, charge: &Charge) -> Result<ChargeOutcome>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("building payment HTTP client")?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            endpoint: STRIPE_CHARGES_URL.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn charge(&self, charge: &Charge) -> Result<ChargeOutcome> {
        let minor_units = charge
            .amount
            .checked_mul(100)
            .ok_or_else(|| anyhow!("donation amount {} overflows", charge.amount))?;

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", minor_units.to_string()),
                ("currency", CURRENCY.to_string()),
                ("source", charge.source.clone()),
                ("description", charge.description.clone()),
            ])
            .send()
            .await
            .context("contacting payment provider")?;

        if response.status().is_success() {
            info!("Charged {} {}", charge.amount, CURRENCY);
            return Ok(ChargeOutcome::Succeeded);
        }

        let status = response.status();
        let body: StripeErrorBody = response
            .json()
            .await
            .with_context(|| format!("unreadable payment error response ({})", status))?;

        classify_failure(body.error)
    }
}

fn classify_failure(error: StripeError) -> Result<ChargeOutcome> {
    if error.kind == "card_error" {
        let reason = error.message.unwrap_or_else(|| "card declined".into());
        warn!("Card declined: {}", reason);
        Ok(ChargeOutcome::Declined(reason))
    } else {
        Err(anyhow!(
            "payment provider error ({}): {}",
            error.kind,
            error.message.unwrap_or_default()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StripeError {
        serde_json::from_str::<StripeErrorBody>(json).unwrap().error
    }

    #[test]
    fn card_errors_are_declines() {
        let outcome = classify_failure(parse(
            r#"{"error":{"type":"card_error","message":"Your card has insufficient funds."}}"#,
        ))
        .unwrap();
        assert_eq!(outcome, ChargeOutcome::Declined("Your card has insufficient funds.".into()));
    }

    #[test]
    fn other_errors_are_failures() {
        let result = classify_failure(parse(r#"{"error":{"type":"api_error"}}"#));
        assert!(result.is_err());
    }
}
