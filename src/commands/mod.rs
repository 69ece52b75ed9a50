pub mod companies;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shifts;
pub mod tables;
