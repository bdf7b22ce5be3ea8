//! Admission cutoff prediction and campus placement analytics.
//!
//! Both analyses are pure functions over reference data loaded once at start-up:
//!
//! - [`predictor::CutoffMatcher`] projects next year's cutoff for every
//!   (institution, program) offering and classifies a candidate's rank as
//!   eligible, borderline or not eligible.
//! - [`placements::PlacementAggregator`] and [`placements::aggregate_by_company`]
//!   turn yearly placement snapshots into per-year and per-company views.
//!
//! [`data::DataLoader`] validates the datasets, [`report`] writes text and CSV
//! reports and [`server`] exposes the same analyses over HTTP.

pub mod data;
pub mod error;
pub mod models;
pub mod placements;
pub mod predictor;
pub mod report;
pub mod server;
