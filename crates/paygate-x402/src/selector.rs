use crate::payment::{PaymentRequirements, Scheme};
use crate::X402Error;

/// Pick the requirement matching `network` and `scheme` exactly.
///
/// `network` is the caller's active network. When it is `None` (e.g. no
/// wallet connected yet) nothing matches: the selector never guesses, so a
/// caller that wants a default must pass it explicitly. When several
/// requirements share the pair, the first one wins.
pub fn select_requirement<'a>(
    requirements: &'a [PaymentRequirements],
    network: Option<&str>,
    scheme: Scheme,
) -> Option<&'a PaymentRequirements> {
    let network = network?;
    requirements
        .iter()
        .find(|r| r.network == network && r.scheme == scheme)
}

/// [`select_requirement`] as a `Result`, for callers that treat "not
/// configured for this network" as an error.
pub fn require_requirement<'a>(
    requirements: &'a [PaymentRequirements],
    network: Option<&str>,
    scheme: Scheme,
) -> Result<&'a PaymentRequirements, X402Error> {
    select_requirement(requirements, network, scheme).ok_or_else(|| {
        X402Error::NoMatchingRequirements {
            network: network.map(str::to_string),
            scheme: scheme.to_string(),
        }
    })
}
