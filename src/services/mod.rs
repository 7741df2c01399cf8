pub mod analytics_service;
pub mod portfolio_service;
pub mod price_service;
pub mod quote_cache;
pub mod report_service;
pub mod trade_service;
