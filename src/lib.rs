pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod path_util;
pub mod propfind;
pub mod provider;
pub mod splitfile;
pub mod stream;
pub mod webdav;
