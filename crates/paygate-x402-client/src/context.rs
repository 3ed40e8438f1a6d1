use alloy::primitives::U256;
use x402::{require_requirement, PaymentRequirements, Scheme, X402Error};

/// Wallet-side settings consulted when answering a 402.
///
/// Passed to [`X402Client`](crate::X402Client) explicitly; nothing about the
/// connected wallet is read from process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentContext {
    /// Network the wallet is connected to. While `None` nothing is paid.
    pub active_network: Option<String>,
    /// Largest amount, in base units, the client agrees to sign for.
    pub max_amount: Option<U256>,
}

impl PaymentContext {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            active_network: Some(network.into()),
            max_amount: None,
        }
    }

    /// No wallet connected yet.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn with_max_amount(mut self, max_amount: U256) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    /// The requirement to pay on the active network.
    pub fn select<'a>(
        &self,
        accepts: &'a [PaymentRequirements],
    ) -> Result<&'a PaymentRequirements, X402Error> {
        require_requirement(accepts, self.active_network.as_deref(), Scheme::Exact)
    }

    /// Refuse requirements above [`max_amount`](Self::max_amount).
    pub fn check_budget(&self, requirements: &PaymentRequirements) -> Result<(), X402Error> {
        let Some(max) = self.max_amount else {
            return Ok(());
        };
        let amount = U256::from_str_radix(&requirements.max_amount_required, 10).map_err(|e| {
            X402Error::InvalidAmount {
                amount: requirements.max_amount_required.clone(),
                reason: e.to_string(),
            }
        })?;
        if amount > max {
            return Err(X402Error::InvalidAmount {
                amount: requirements.max_amount_required.clone(),
                reason: format!("exceeds the client limit of {max} base units"),
            });
        }
        Ok(())
    }
}
