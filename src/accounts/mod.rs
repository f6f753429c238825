pub mod bonding_curve;
pub mod fetcher;

pub use bonding_curve::{decode_curve_state, BondingCurveState, BONDING_CURVE_SIZE};
pub use fetcher::{AccountFetcher, RpcAccountFetcher};
