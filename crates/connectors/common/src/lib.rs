pub mod sign;
pub mod simulated;
