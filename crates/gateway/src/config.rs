//! Engine configuration from environment variables.

use anyhow::{Context, Result};
use executor::VenueParams;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, parsed once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address.
    pub host: String,
    pub port: u16,
    /// Host clients should dial for the subscribe URL.
    pub public_host: String,
    pub metrics_port: u16,
    /// Worker parallelism.
    pub queue_concurrency: usize,
    /// Job starts per rolling minute.
    pub queue_rate_limit: u32,
    pub max_retry_attempts: u32,
    pub queue_visibility_timeout: Duration,
    pub cache_ttl: Duration,
    /// Optional Redis mirror for the hot cache.
    pub redis_url: Option<String>,
    /// Per-venue fee overrides.
    pub raydium_fee: Option<Decimal>,
    pub meteora_fee: Option<Decimal>,
    /// Simulated swap execution window, milliseconds.
    pub execution_delay_ms: (u64, u64),
}

impl Config {
    /// Read configuration from the environment, with defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_parse("SERVER_PORT", 8080)?,
            public_host: env_or("PUBLIC_HOST", "localhost"),
            metrics_port: env_parse("METRICS_PORT", 9090)?,
            queue_concurrency: env_parse("QUEUE_CONCURRENCY", 10)?,
            queue_rate_limit: env_parse("QUEUE_RATE_LIMIT", 100)?,
            max_retry_attempts: env_parse("MAX_RETRY_ATTEMPTS", 3)?,
            queue_visibility_timeout: Duration::from_secs(env_parse(
                "QUEUE_VISIBILITY_TIMEOUT_SECS",
                60u64,
            )?),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", 3600u64)?),
            redis_url: std::env::var("REDIS_URL").ok(),
            raydium_fee: env_parse_opt("VENUE_FEE_RAYDIUM")?,
            meteora_fee: env_parse_opt("VENUE_FEE_METEORA")?,
            execution_delay_ms: (
                env_parse("EXECUTION_DELAY_MS_MIN", 150u64)?,
                env_parse("EXECUTION_DELAY_MS_MAX", 400u64)?,
            ),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Subscription URL for an order. Scheme would be `wss` behind a TLS
    /// terminator; the engine itself serves plaintext.
    pub fn subscribe_url(&self, order_id: &str) -> String {
        format!(
            "ws://{}:{}/ws/orders/{}",
            self.public_host, self.port, order_id
        )
    }

    /// Reference driver parameters with configured overrides applied.
    pub fn venue_params(&self) -> (VenueParams, VenueParams) {
        let (min, max) = self.execution_delay_ms;
        let mut raydium = VenueParams::raydium().with_swap_delay_ms(min, max);
        if let Some(fee) = self.raydium_fee {
            raydium = raydium.with_fee_rate(fee);
        }
        let mut meteora = VenueParams::meteora().with_swap_delay_ms(min, max);
        if let Some(fee) = self.meteora_fee {
            meteora = meteora.with_fee_rate(fee);
        }
        (raydium, meteora)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_host: "localhost".to_string(),
            metrics_port: 9090,
            queue_concurrency: 10,
            queue_rate_limit: 100,
            max_retry_attempts: 3,
            queue_visibility_timeout: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(3600),
            redis_url: None,
            raydium_fee: None,
            meteora_fee: None,
            execution_delay_ms: (150, 400),
        }
    }

    #[test]
    fn test_subscribe_url_shape() {
        let config = make_config();
        assert_eq!(
            config.subscribe_url("abc-123"),
            "ws://localhost:8080/ws/orders/abc-123"
        );
    }

    #[test]
    fn test_venue_fee_override() {
        use rust_decimal_macros::dec;
        let mut config = make_config();
        config.raydium_fee = Some(dec!(0.004));

        let (raydium, meteora) = config.venue_params();
        assert_eq!(raydium.fee_rate, dec!(0.004));
        assert_eq!(raydium.swap_delay_ms, (150, 400));
        assert_eq!(meteora.fee_rate, VenueParams::meteora().fee_rate);
    }
}
