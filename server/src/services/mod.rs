//! Business services

pub mod orders;
