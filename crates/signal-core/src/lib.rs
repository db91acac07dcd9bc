//! Green-time allocation and control for a four-way intersection.
//!
//! This crate turns per-lane vehicle counts and emergency flags into an
//! authoritative green-light schedule, and re-evaluates that schedule on a
//! periodic or triggered cadence. It performs no I/O of its own: sensing
//! back-ends feed it through [`ObservationSource`] and consumers receive
//! schedules through [`SchedulePublisher`].
//!
//! # Modules
//!
//! - [`allocator`] -- Proportional green-time allocation with the
//!   emergency override pass.
//! - [`config`] -- Configuration loading from `signal-config.yaml` into
//!   strongly-typed structs.
//! - [`controller`] -- Per-intersection owner of the current schedule.
//! - [`observation`] -- Normalization of raw reports into a complete
//!   four-lane observation set.
//! - [`operator`] -- Pause, resume, cadence, trigger, and stop controls.
//! - [`runner`] -- The cadence-driven run loop.
//! - [`source`] -- [`ObservationSource`] trait and in-process sources.
//!
//! [`ObservationSource`]: source::ObservationSource
//! [`SchedulePublisher`]: runner::SchedulePublisher

pub mod allocator;
pub mod config;
pub mod controller;
pub mod observation;
pub mod operator;
pub mod runner;
pub mod source;
