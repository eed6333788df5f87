//! HTTP handlers

pub mod health;
pub mod info;
pub mod predict;

#[cfg(test)]
mod tests;
