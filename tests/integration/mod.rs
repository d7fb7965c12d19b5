//! Integration test modules

mod chat_completions;
mod dispatch;
mod proxy_routes;
mod virtual_routes;
