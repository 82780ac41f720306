pub mod corpus;
pub mod data_collector;
pub mod database;
pub mod model_store;
pub mod price_feed;

pub use corpus::TrainingCorpus;
pub use data_collector::{CollectionBatch, CollectionReport, DataCollector};
pub use database::Database;
pub use model_store::ModelStore;
pub use price_feed::{fetch_prices, AgmarknetClient, MarketDataProvider, SyntheticMarketData};
