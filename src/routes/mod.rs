pub mod group;
pub mod health;
pub mod member;
pub mod realtime;
pub mod user;
