//! Routes that belong to no resource module.

pub mod health;
