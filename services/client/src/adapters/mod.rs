pub mod http;
pub mod token_store;

pub use http::ReqwestExchange;
pub use token_store::{FileTokenStore, MemoryTokenStore};
