pub mod alert;
pub mod incident;
pub mod rule;
pub mod user;
