//! Segment-skip scheduling engine.
//!
//! Given the crowd-sourced segment list for the media item that is currently
//! playing, a [`handler::SkipHandler`] advances playback past enabled
//! categories and keeps a marker strip on the host's progress bar. Hosts plug
//! in through the traits in [`surface`], [`overlay`] and [`timer`]; the
//! [`navigator::Navigator`] guarantees at most one live handler.

pub mod config;
pub mod error;
pub mod handler;
pub mod hash;
pub mod navigator;
pub mod overlay;
pub mod platform;
pub mod policy;
pub mod repository;
pub mod segments;
pub mod surface;
pub mod timer;
