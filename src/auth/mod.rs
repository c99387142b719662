pub mod oauth;

pub use oauth::{AccessToken, Credentials, TokenProvider};
