// src/handlers/mod.rs

pub mod auth;
pub mod groups;
pub mod profile;
pub mod quiz;
