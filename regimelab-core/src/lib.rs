//! RegimeLab Core: domain types, regime classification, gates, and the simulation engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars with Heiken-Ashi candles, signals, positions, trades)
//! - Causal rolling-window regime classifier (per-window scaler + seeded k-means)
//! - Pattern, volume and signal gates
//! - Fixed-shape feature vectors and the upstream signal-source boundary
//! - Position simulator and bar-by-bar loop

pub mod domain;
pub mod engine;
pub mod gates;
pub mod regime;
pub mod rng;
pub mod signals;
