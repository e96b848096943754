//! End-to-end scenario tests

mod event_pairing;
mod falling_spheres;
mod filtering;
mod queries;
