pub mod config;
pub mod credentials;
pub mod dav;
pub mod errors;
pub mod graph;
pub mod harness;
pub mod http;
pub mod locks;
pub mod logger;
pub mod mocks;
pub mod ocs;
pub mod response;
pub mod scenario;
pub mod settings;
pub mod utils;
