pub mod comic_id;
pub mod config;
pub mod json_extract;
pub mod logging;
pub mod paths;
pub mod settings;
