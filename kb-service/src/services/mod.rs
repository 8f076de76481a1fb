pub mod chat_service;
pub mod fetcher;
pub mod llm;
pub mod locks;
pub mod metrics;
pub mod providers;
pub mod session_store;
pub mod sitemap;
