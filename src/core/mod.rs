pub mod notification;
pub mod preferences;
pub mod query;
pub mod record;
pub mod task;
pub mod time;
pub mod user;
