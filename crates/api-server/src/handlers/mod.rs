pub mod bids;
pub mod health;
pub mod orders;
pub mod rankings;
