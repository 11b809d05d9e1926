pub mod fetcher;
pub mod guard;
pub mod page_source;

pub use fetcher::ReqwestFetcher;
pub use guard::AddressPolicy;
pub use page_source::HttpPageSource;
