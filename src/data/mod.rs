pub mod card;
pub mod error;
pub mod team;
pub mod validate;
