pub mod config;
pub mod logging;

pub mod agent;
pub mod audit;
pub mod case;
pub mod officer;
pub mod transfer;
pub mod worklist;
