pub mod auth;
pub mod data_uri;
pub mod keyed_mutex;
pub mod validation;
