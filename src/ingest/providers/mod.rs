pub mod keyword_search;
pub mod newsapi;
pub mod rss_feed;

pub use keyword_search::KeywordSearchProvider;
pub use newsapi::NewsApiProvider;
pub use rss_feed::RssFeedProvider;
