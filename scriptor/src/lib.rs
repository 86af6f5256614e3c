//! Dual-engine OCR: Tesseract for printed text, TrOCR for handwriting.
//!
//! The crate is split into the preprocessing pipeline and preset resolver
//! ([`processing`]), the recognition engines ([`ocr`]), the neural model
//! lifecycle ([`lifecycle`]) and the orchestrator that ties them together
//! with fallback ([`services`]). [`api`] exposes all of it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod ocr;
pub mod processing;
pub mod services;

pub use error::{Result, ScriptorError};
