pub mod get_order;
pub mod health;
pub mod index;
