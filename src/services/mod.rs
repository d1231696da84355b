//! Business logic services

pub mod takeoff;
