pub mod rolling;
pub mod rsi;
