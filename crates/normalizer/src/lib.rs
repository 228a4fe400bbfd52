//! Native/wrapped asset normalization for swap intake.
//!
//! Exchange venues only trade token-standard mints, so the native asset has
//! to be presented as its wrapped equivalent before routing. This crate is
//! pure address arithmetic: no I/O, no state.
//!
//! The engine stores the *original* addresses on the order and hands the
//! *normalized* addresses to the router and venue drivers; both forms travel
//! in emitted events so the mapping stays observable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The native-asset sentinel address (the system program id).
pub const NATIVE_MINT: &str = "11111111111111111111111111111111";

/// The wrapped-native SPL mint every venue actually trades.
pub const WRAPPED_NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Base58 alphabet used by mint addresses (no `0`, `O`, `I`, `l`).
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Result type alias for normalization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Normalization errors. All of these reject a request before it is
/// admitted; none are retriable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Address is not a plausible base58 mint.
    #[error("invalid token address '{0}': expected 32-44 base58 characters")]
    InvalidAddress(String),

    /// Input and output resolve to the same asset.
    #[error("tokenIn and tokenOut are the same asset after normalization")]
    SameAsset,
}

/// Map the native sentinel to the wrapped mint; identity otherwise.
pub fn normalize(addr: &str) -> &str {
    if addr == NATIVE_MINT {
        WRAPPED_NATIVE_MINT
    } else {
        addr
    }
}

/// Whether the address is the native-asset sentinel.
pub fn is_native(addr: &str) -> bool {
    addr == NATIVE_MINT
}

/// Validate a single mint address: length 32-44, base58 alphabet only.
pub fn validate_address(addr: &str) -> Result<()> {
    let len = addr.len();
    if !(32..=44).contains(&len) || !addr.chars().all(|c| BASE58_ALPHABET.contains(c)) {
        return Err(Error::InvalidAddress(addr.to_string()));
    }
    Ok(())
}

/// Validate a swap pair.
///
/// Fails with [`Error::SameAsset`] when the two addresses are equal before
/// normalization, or when they collapse to the same mint after it (which
/// catches native vs. wrapped of the same underlying).
pub fn validate_pair(token_in: &str, token_out: &str) -> Result<()> {
    validate_address(token_in)?;
    validate_address(token_out)?;
    if token_in == token_out || normalize(token_in) == normalize(token_out) {
        return Err(Error::SameAsset);
    }
    Ok(())
}

/// Wrap/unwrap plan for one swap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WrapPlan {
    /// The input is native and must be wrapped before the swap.
    pub needs_wrap_in: bool,
    /// The output leg is native and must be unwrapped after the swap.
    pub needs_unwrap_out: bool,
    /// Amount to wrap up front; zero when no wrap is needed.
    pub wrap_amount: Decimal,
    pub normalized_in: String,
    pub normalized_out: String,
}

/// Compute the wrap plan for a validated pair.
pub fn wrap_instructions(token_in: &str, token_out: &str, amount_in: Decimal) -> Result<WrapPlan> {
    validate_pair(token_in, token_out)?;

    let needs_wrap_in = is_native(token_in);
    let needs_unwrap_out = is_native(token_out);

    Ok(WrapPlan {
        needs_wrap_in,
        needs_unwrap_out,
        wrap_amount: if needs_wrap_in {
            amount_in
        } else {
            Decimal::ZERO
        },
        normalized_in: normalize(token_in).to_string(),
        normalized_out: normalize(token_out).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    #[test]
    fn test_normalize_maps_native_to_wrapped() {
        assert_eq!(normalize(NATIVE_MINT), WRAPPED_NATIVE_MINT);
        assert_eq!(normalize(USDC), USDC);
        assert_eq!(normalize(WRAPPED_NATIVE_MINT), WRAPPED_NATIVE_MINT);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for addr in [NATIVE_MINT, WRAPPED_NATIVE_MINT, USDC] {
            assert_eq!(normalize(normalize(addr)), normalize(addr));
        }
    }

    #[test]
    fn test_validate_address_rejects_bad_input() {
        assert!(validate_address("").is_err());
        assert!(validate_address("short").is_err());
        // 'O' is not in the base58 alphabet
        assert!(validate_address("OOOOOOOOOOOOOOOOOOOOOOOOOOOOOOOO").is_err());
        // Too long (45 chars)
        assert!(validate_address(&"1".repeat(45)).is_err());
        assert!(validate_address(NATIVE_MINT).is_ok());
        assert!(validate_address(USDC).is_ok());
    }

    #[test]
    fn test_validate_pair_rejects_identical_addresses() {
        assert_eq!(validate_pair(USDC, USDC), Err(Error::SameAsset));
    }

    #[test]
    fn test_validate_pair_rejects_native_vs_wrapped() {
        assert_eq!(
            validate_pair(NATIVE_MINT, WRAPPED_NATIVE_MINT),
            Err(Error::SameAsset)
        );
        assert_eq!(
            validate_pair(WRAPPED_NATIVE_MINT, NATIVE_MINT),
            Err(Error::SameAsset)
        );
    }

    #[test]
    fn test_validate_pair_accepts_distinct_assets() {
        assert!(validate_pair(NATIVE_MINT, USDC).is_ok());
        assert!(validate_pair(USDC, WRAPPED_NATIVE_MINT).is_ok());
    }

    #[test]
    fn test_wrap_instructions_native_in() {
        let plan = wrap_instructions(NATIVE_MINT, USDC, dec!(1.5)).unwrap();
        assert!(plan.needs_wrap_in);
        assert!(!plan.needs_unwrap_out);
        assert_eq!(plan.wrap_amount, dec!(1.5));
        assert_eq!(plan.normalized_in, WRAPPED_NATIVE_MINT);
        assert_eq!(plan.normalized_out, USDC);
    }

    #[test]
    fn test_wrap_instructions_native_out() {
        let plan = wrap_instructions(USDC, NATIVE_MINT, dec!(100)).unwrap();
        assert!(!plan.needs_wrap_in);
        assert!(plan.needs_unwrap_out);
        assert_eq!(plan.wrap_amount, Decimal::ZERO);
        assert_eq!(plan.normalized_out, WRAPPED_NATIVE_MINT);
    }

    #[test]
    fn test_wrap_instructions_token_to_token() {
        let plan = wrap_instructions(USDC, WRAPPED_NATIVE_MINT, dec!(10)).unwrap();
        assert!(!plan.needs_wrap_in);
        assert!(!plan.needs_unwrap_out);
        assert_eq!(plan.wrap_amount, Decimal::ZERO);
    }
}
