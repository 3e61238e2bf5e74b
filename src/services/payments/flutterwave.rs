use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;

use super::{is_valid_transaction_id, PaymentProvider, PaymentRequest, TransactionVerification};

pub struct FlutterwaveProvider {
    base_url: String,
    secret_key: String,
    client: reqwest::Client,
}

impl FlutterwaveProvider {
    pub fn new(base_url: String, secret_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Flutterwave HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            client,
        })
    }

    fn verify_url(&self, transaction_id: &str) -> anyhow::Result<String> {
        if !is_valid_transaction_id(transaction_id) {
            anyhow::bail!("refusing to verify malformed transaction id {transaction_id:?}");
        }
        Ok(format!(
            "{}/v3/transactions/{}/verify",
            self.base_url, transaction_id
        ))
    }
}

#[async_trait]
impl PaymentProvider for FlutterwaveProvider {
    async fn create_payment(&self, request: &PaymentRequest) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{}/v3/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await
            .context("failed to call Flutterwave payments API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Flutterwave payment response")?;

        parse_payment_link(status, &data)
    }

    async fn verify_transaction(
        &self,
        transaction_id: &str,
    ) -> anyhow::Result<TransactionVerification> {
        let resp = self
            .client
            .get(self.verify_url(transaction_id)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("failed to call Flutterwave verify API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Flutterwave verify response")?;

        parse_verification(status, &data)
    }
}

fn parse_payment_link(status: StatusCode, data: &serde_json::Value) -> anyhow::Result<String> {
    if !status.is_success() {
        anyhow::bail!("Flutterwave payments API error ({}): {}", status, data);
    }

    data["data"]["link"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing payment link in Flutterwave response"))
}

fn parse_verification(
    status: StatusCode,
    data: &serde_json::Value,
) -> anyhow::Result<TransactionVerification> {
    if !status.is_success() {
        anyhow::bail!("Flutterwave verify API error ({}): {}", status, data);
    }

    let details = &data["data"];
    Ok(TransactionVerification {
        status: data["status"].as_str().unwrap_or_default().to_string(),
        transaction_status: details["status"].as_str().map(|s| s.to_string()),
        tx_ref: details["tx_ref"].as_str().map(|s| s.to_string()),
        amount: details["amount"].as_f64(),
    })
}
