mod holding;
mod ledger;
mod portfolio;
mod quote;
mod trade;

pub use holding::{Holding, UpdateHolding, UNCLASSIFIED_SECTOR};
pub use ledger::{CollectionInfo, LedgerDocument, LedgerMeta, LEDGER_VERSION};
pub use portfolio::{
    Allocation, ConcentrationRisk, CreatePortfolio, DiversificationRating, Performance, Portfolio,
    RiskProfile, SectorAllocation, UpdatePortfolio,
};
pub use quote::{FailedQuote, MarketData, PriceUpdate, Quote, RefreshSummary};
pub use trade::{PositionChange, Trade, TradeAction, TradeOutcome, TradeRecord};
