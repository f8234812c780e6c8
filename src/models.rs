pub mod analytics;
pub mod users;
