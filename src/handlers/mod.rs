// src/handlers/mod.rs

pub mod attempt;
pub mod grading;
pub mod question;
pub mod quiz;
