pub mod config;
pub mod logging;

pub mod awake;
pub mod check;
pub mod checksum;
pub mod control;
pub mod descriptor;
pub mod downloader;
pub mod freshness;
pub mod install;
pub mod installed;
pub mod network;
pub mod packages;
pub mod retry;
pub mod storage;
pub mod store;
pub mod transport;
