//! Terminal presentation of each command

pub mod cars;
pub mod checkout;
pub mod compare;
pub mod prices;
pub mod setup;
pub mod ui;
pub mod watch;
