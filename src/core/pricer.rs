//! Bonding-curve spot price
//!
//! `price = (virtual_sol_reserves / 10^9) / (virtual_token_reserves / 10^6)`, in SOL
//! per whole token. The account is re-read for every lookup; nothing is cached.

use crate::accounts::{decode_curve_state, AccountFetcher, BondingCurveState};
use crate::core::events::{PriceEvent, PriceOutcome, PumpEvent};
use crate::error::{FetchError, PricingError};
use chrono::Utc;
use crossbeam_queue::ArrayQueue;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
/// 10^9 as a decimal exponent
pub const SOL_DECIMALS: u32 = 9;
/// pump.fun tokens are minted with 6 decimals
pub const TOKEN_DECIMALS: u32 = 6;

/// Spot price of one whole token in SOL.
pub fn price(state: &BondingCurveState) -> Result<Decimal, PricingError> {
    let invalid = || PricingError::InvalidReserves {
        virtual_token_reserves: state.virtual_token_reserves,
        virtual_sol_reserves: state.virtual_sol_reserves,
    };
    if state.virtual_token_reserves == 0 || state.virtual_sol_reserves == 0 {
        return Err(invalid());
    }

    let sol = Decimal::from_i128_with_scale(state.virtual_sol_reserves as i128, SOL_DECIMALS);
    let tokens = Decimal::from_i128_with_scale(state.virtual_token_reserves as i128, TOKEN_DECIMALS);
    sol.checked_div(tokens).ok_or_else(invalid)
}

/// Retry policy for price lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLookupConfig {
    /// Attempts per lookup; a not-yet-initialized curve or a rate limit consumes one
    pub max_attempts: u32,
    /// Pause between attempts, milliseconds
    pub retry_delay_ms: u64,
}

impl Default for PriceLookupConfig {
    fn default() -> Self {
        Self { max_attempts: 3, retry_delay_ms: 5_000 }
    }
}

/// Reads bonding-curve accounts and prices them.
#[derive(Clone)]
pub struct PriceService {
    fetcher: Arc<dyn AccountFetcher>,
    config: PriceLookupConfig,
}

impl PriceService {
    pub fn new(fetcher: Arc<dyn AccountFetcher>, config: PriceLookupConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &PriceLookupConfig {
        &self.config
    }

    /// One fetch, no retry.
    pub async fn lookup_once(&self, bonding_curve: &Pubkey) -> Result<PriceOutcome, FetchError> {
        let data = match self.fetcher.fetch_account_data(bonding_curve).await? {
            Some(data) if !data.is_empty() => data,
            _ => return Ok(PriceOutcome::NotInitialized),
        };

        let state = match decode_curve_state(&data) {
            Ok(state) => state,
            Err(e) => {
                warn!("bonding curve {} has unexpected layout: {}", bonding_curve, e);
                return Ok(PriceOutcome::Failed(e.to_string()));
            }
        };

        Ok(match price(&state) {
            Ok(price_sol) => PriceOutcome::Priced { price_sol, state },
            Err(e) => {
                debug!("bonding curve {} not yet priced: {}", bonding_curve, e);
                PriceOutcome::NotYetPriced
            }
        })
    }

    /// Fetch with retries on `NotInitialized` and rate limiting.
    pub async fn lookup(&self, bonding_curve: &Pubkey) -> PriceOutcome {
        let attempts = self.config.max_attempts.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut last = PriceOutcome::NotInitialized;

        for attempt in 1..=attempts {
            match self.lookup_once(bonding_curve).await {
                Ok(PriceOutcome::NotInitialized) => {
                    debug!("bonding curve {} not initialized (attempt {})", bonding_curve, attempt);
                    last = PriceOutcome::NotInitialized;
                }
                Ok(outcome) => return outcome,
                Err(FetchError::RateLimited) => {
                    warn!("rpc rate limited while pricing {} (attempt {})", bonding_curve, attempt);
                    last = PriceOutcome::Failed(FetchError::RateLimited.to_string());
                }
                Err(e) => return PriceOutcome::Failed(e.to_string()),
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        last
    }

    /// Runs [`lookup`](Self::lookup) as a detached task and pushes the result to `queue`.
    pub fn spawn_lookup(
        &self,
        mint: Pubkey,
        bonding_curve: Pubkey,
        queue: Arc<ArrayQueue<PumpEvent>>,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let outcome = service.lookup(&bonding_curve).await;
            if let PriceOutcome::Priced { price_sol, .. } = &outcome {
                info!("{} priced at {} SOL", mint, price_sol);
            }
            let event = PumpEvent::Price(PriceEvent {
                mint,
                bonding_curve,
                outcome,
                observed_at: Utc::now(),
            });
            if queue.push(event).is_err() {
                warn!("event queue full, dropping price for {}", mint);
            }
        })
    }
}
