pub mod llm;
pub mod market_data;
pub mod marketwatch;
pub mod news;
pub mod yahoo;

pub use llm::{GeminiClient, OpenAiClient};
pub use market_data::MarketDataService;
pub use marketwatch::MarketWatchClient;
pub use news::NewsClient;
pub use yahoo::YahooFinanceClient;
