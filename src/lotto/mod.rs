pub mod client;
pub mod provider;
pub mod types;

pub use client::LottoClient;
pub use provider::{LottoProvider, ProviderError};
pub use types::{GameInfo, LatestDraw};
