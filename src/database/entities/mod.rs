pub mod customers;
pub mod modules;
pub mod pages;
pub mod roles;
pub mod sites;
pub mod subscriptions;
pub mod user_roles;
pub mod users;
