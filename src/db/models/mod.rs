//! Database models split into domain-specific modules.

pub mod admin;
pub mod appointment;
pub mod article;
pub mod doctor;
pub mod token;
pub mod user;

pub use admin::*;
pub use appointment::*;
pub use article::*;
pub use doctor::*;
pub use token::*;
pub use user::*;
