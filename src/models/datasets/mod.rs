pub mod logs;
pub mod transactions;
pub mod transfers;
