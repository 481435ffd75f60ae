pub mod api;
pub mod assignment;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod lab;
pub mod session;
pub mod shutdown;
