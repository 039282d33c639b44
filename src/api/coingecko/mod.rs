pub mod client;

pub use client::{CoinGeckoClient, COINGECKO_API_URL};
