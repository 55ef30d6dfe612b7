//! taccuino: the data layer of a personal blog front-end.
//!
//! Posts come from two places: a headless CMS fetched at runtime and a
//! manifest bundled at build time. This crate merges them into one
//! canonical collection (CMS wins by slug), batches per-post view, rating,
//! and comment counters behind request-set-keyed caches, and records
//! single-post views through an optimistic increment protocol. Every
//! managed backend sits behind a trait with a degrading fallback, so a
//! missing CMS or an unconfigured counter store never breaks a render.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
