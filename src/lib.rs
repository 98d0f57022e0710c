pub mod api;
pub mod commit;
pub mod config;
pub mod document;
pub mod driver;
pub mod fence;
pub mod logging;
pub mod session;
pub mod sink;
pub mod types;

#[cfg(test)]
mod test_support;
