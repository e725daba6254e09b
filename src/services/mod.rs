pub mod costing;
pub mod line_items;
pub mod stock;
pub mod transfers;
