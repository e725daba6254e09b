pub mod product;
pub mod stock_level;
pub mod transfer;
pub mod transfer_item;
pub mod warehouse;
