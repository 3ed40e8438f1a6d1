//! Built-in network table.
//!
//! Networks with a default USDC asset are "supported": routes priced in money
//! on them need no further configuration. Known chains without a default asset
//! (and any identifier not listed here) require a custom token at startup.

/// How a network signs and settles payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFamily {
    /// EVM chain; the chain id goes into the EIP-712 domain.
    Evm { chain_id: u64 },
    /// Solana; payments are partially-signed SPL transfers.
    Svm,
}

/// A token deployment on a specific network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    /// EIP-712 domain version. `None` for SPL tokens.
    pub version: Option<&'static str>,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub family: NetworkFamily,
    pub testnet: bool,
    pub usdc: Option<TokenInfo>,
}

const fn usdc(address: &'static str, name: &'static str) -> Option<TokenInfo> {
    Some(TokenInfo {
        address,
        name,
        symbol: "USDC",
        version: Some("2"),
        decimals: 6,
    })
}

const fn spl_usdc(address: &'static str) -> Option<TokenInfo> {
    Some(TokenInfo {
        address,
        name: "USDC",
        symbol: "USDC",
        version: None,
        decimals: 6,
    })
}

const fn evm(
    id: &'static str,
    display_name: &'static str,
    chain_id: u64,
    testnet: bool,
    usdc: Option<TokenInfo>,
) -> NetworkInfo {
    NetworkInfo {
        id,
        display_name,
        family: NetworkFamily::Evm { chain_id },
        testnet,
        usdc,
    }
}

pub const NETWORKS: &[NetworkInfo] = &[
    evm(
        "base",
        "Base",
        8453,
        false,
        usdc("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "USD Coin"),
    ),
    evm(
        "base-sepolia",
        "Base Sepolia",
        84532,
        true,
        usdc("0x036CbD53842c5426634e7929541eC2318f3dCF7e", "USDC"),
    ),
    evm(
        "avalanche",
        "Avalanche",
        43114,
        false,
        usdc("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E", "USD Coin"),
    ),
    evm(
        "avalanche-fuji",
        "Avalanche Fuji",
        43113,
        true,
        usdc("0x5425890298aed601595a70AB815c96711a31Bc65", "USD Coin"),
    ),
    evm(
        "iotex",
        "IoTeX",
        4689,
        false,
        usdc("0xcdf79194c6c285077a58da47641d4dbe51f63542", "Bridged USDC"),
    ),
    evm(
        "polygon",
        "Polygon",
        137,
        false,
        usdc("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", "USD Coin"),
    ),
    evm(
        "polygon-amoy",
        "Polygon Amoy",
        80002,
        true,
        usdc("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582", "USDC"),
    ),
    evm(
        "sei",
        "Sei",
        1329,
        false,
        usdc("0xe15fC38F6D8c56aF07bbCBe3BAf5708A2Bf42392", "USDC"),
    ),
    evm(
        "sei-testnet",
        "Sei Testnet",
        1328,
        true,
        usdc("0x4fCF1784B31630811181f670Aea7A7bEF803eaED", "USDC"),
    ),
    evm(
        "peaq",
        "Peaq",
        3338,
        false,
        usdc("0xbbA60da06c2c5424f03f7434542280FCAd453d10", "USDC"),
    ),
    // Known chains without a default asset: pricing on these needs a custom token.
    evm("bsc", "BNB Smart Chain", 56, false, None),
    evm("bsc-testnet", "BSC Testnet", 97, true, None),
    NetworkInfo {
        id: "solana",
        display_name: "Solana",
        family: NetworkFamily::Svm,
        testnet: false,
        usdc: spl_usdc("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
    },
    NetworkInfo {
        id: "solana-devnet",
        display_name: "Solana Devnet",
        family: NetworkFamily::Svm,
        testnet: true,
        usdc: spl_usdc("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    },
];

/// Look up a network by identifier.
pub fn lookup(network: &str) -> Option<&'static NetworkInfo> {
    NETWORKS.iter().find(|n| n.id == network)
}

/// True if the network is in the built-in supported set (has a default asset).
pub fn is_supported(network: &str) -> bool {
    default_asset(network).is_some()
}

/// Platform default asset (USDC) for a network, if it has one.
pub fn default_asset(network: &str) -> Option<&'static TokenInfo> {
    lookup(network).and_then(|n| n.usdc.as_ref())
}

/// EVM chain id for a known network.
pub fn chain_id(network: &str) -> Option<u64> {
    match lookup(network)?.family {
        NetworkFamily::Evm { chain_id } => Some(chain_id),
        NetworkFamily::Svm => None,
    }
}

/// Human-readable name, falling back to the identifier itself.
pub fn display_name(network: &str) -> &str {
    lookup(network).map(|n| n.display_name).unwrap_or(network)
}
