pub(crate) mod health;
pub(crate) mod market;
pub(crate) mod portfolios;
pub(crate) mod prices;
