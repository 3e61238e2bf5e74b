pub mod flutterwave;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub email: String,
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customizations {
    pub title: String,
    pub description: String,
}

/// Body of a hosted-checkout payment request.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub tx_ref: String,
    pub amount: f64,
    pub currency: String,
    pub redirect_url: String,
    pub customer: Customer,
    pub customizations: Customizations,
}

/// What the provider reports about a transaction when asked directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionVerification {
    pub status: String,
    pub transaction_status: Option<String>,
    pub tx_ref: Option<String>,
    pub amount: Option<f64>,
}

impl TransactionVerification {
    /// True only when the provider reports a successful transaction for this
    /// exact reference paying at least `minimum_amount`. Missing details fail.
    pub fn confirms(&self, tx_ref: &str, minimum_amount: f64) -> bool {
        self.status == "success"
            && self.transaction_status.as_deref() == Some("successful")
            && self.tx_ref.as_deref() == Some(tx_ref)
            && self.amount.is_some_and(|paid| paid >= minimum_amount)
    }
}

/// Provider transaction ids are numeric; anything else never reaches the API.
pub fn is_valid_transaction_id(transaction_id: &str) -> bool {
    !transaction_id.is_empty() && transaction_id.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Returns the hosted payment link the customer is sent to.
    async fn create_payment(&self, request: &PaymentRequest) -> anyhow::Result<String>;

    async fn verify_transaction(
        &self,
        transaction_id: &str,
    ) -> anyhow::Result<TransactionVerification>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(
        status: &str,
        tx_status: Option<&str>,
        tx_ref: Option<&str>,
        amount: Option<f64>,
    ) -> TransactionVerification {
        TransactionVerification {
            status: status.to_string(),
            transaction_status: tx_status.map(str::to_string),
            tx_ref: tx_ref.map(str::to_string),
            amount,
        }
    }

    #[test]
    fn test_confirms_matching_success() {
        let v = verified("success", Some("successful"), Some("GRACE_1_abcd1234"), Some(5000.0));
        assert!(v.confirms("GRACE_1_abcd1234", 5000.0));
    }

    #[test]
    fn test_rejects_other_reference() {
        let v = verified("success", Some("successful"), Some("GRACE_2_abcd1234"), Some(5000.0));
        assert!(!v.confirms("GRACE_1_abcd1234", 5000.0));
    }

    #[test]
    fn test_rejects_failed_transaction() {
        let failed = verified("success", Some("failed"), Some("GRACE_1_x"), Some(5000.0));
        assert!(!failed.confirms("GRACE_1_x", 5000.0));
        let error = verified("error", Some("successful"), Some("GRACE_1_x"), Some(5000.0));
        assert!(!error.confirms("GRACE_1_x", 5000.0));
    }

    #[test]
    fn test_rejects_underpayment() {
        let v = verified("success", Some("successful"), Some("GRACE_1_x"), Some(4999.0));
        assert!(!v.confirms("GRACE_1_x", 5000.0));
    }

    #[test]
    fn test_missing_details_do_not_confirm() {
        assert!(!verified("success", None, None, None).confirms("GRACE_1_x", 5000.0));
        assert!(!verified("success", Some("successful"), None, Some(5000.0)).confirms("GRACE_1_x", 5000.0));
        assert!(!verified("success", Some("successful"), Some("GRACE_1_x"), None).confirms("GRACE_1_x", 5000.0));
        assert!(!verified("success", None, Some("GRACE_1_x"), Some(5000.0)).confirms("GRACE_1_x", 5000.0));
    }

    #[test]
    fn test_transaction_id_must_be_numeric() {
        assert!(is_valid_transaction_id("288200108"));
        assert!(!is_valid_transaction_id(""));
        assert!(!is_valid_transaction_id("../banks/NG?x="));
        assert!(!is_valid_transaction_id("12/verify"));
        assert!(!is_valid_transaction_id("١٢٣"));
    }
}
