// Page cache contract and a clock-sweep implementation of it
pub mod clocksweep;
pub mod entity;
pub mod manager;
