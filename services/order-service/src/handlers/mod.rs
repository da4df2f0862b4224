pub mod health;
pub mod orders;

pub use orders::{confirm_with_override, create_order, get_order, update_status};
