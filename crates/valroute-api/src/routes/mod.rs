//! # Route Modules
//!
//! Each module registers its validated routes on a shared
//! [`ValidatedRouter`](crate::route::ValidatedRouter). Routers are
//! assembled in [`crate::app`].

pub mod todo;
