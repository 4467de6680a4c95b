pub mod archive;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod datastore;
pub mod ioc;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod risk;
pub mod signature;
pub mod store;
pub mod tools;
pub mod toxicity;
