pub mod auth;
pub mod drive_grantor;
pub mod greeting_sheet;
pub mod http_client;
pub mod value_range_factory;
