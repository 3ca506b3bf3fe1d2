//! Command implementations behind the `bilans` CLI.

pub mod config;
mod download;
mod login;
mod search;
mod select;
mod services;
mod show;

pub use config::{Config, ConfigOverrides};
pub use download::{DEFAULT_OUTPUT, DownloadOptions, download};
pub use login::login;
pub use search::{SearchOptions, search};
pub use select::select;
pub use services::{build_directory, build_geocoder, build_http_client, build_source};
pub use show::show;
