//! Application services layer.

pub mod error;
pub mod honeypot;
pub mod otp;
pub mod purge;
pub mod sources;
pub mod timetable;
