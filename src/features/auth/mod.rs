mod validator;

pub mod dto;
pub mod handler;
pub mod model;
pub mod routes;

pub use validator::JwtValidator;
