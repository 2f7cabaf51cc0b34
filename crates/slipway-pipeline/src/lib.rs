//! Release pipeline sequencing for Slipway.

pub mod sequencer;

pub use sequencer::{ReleasePipeline, RunOutcome, RunReport, RunSpec, RunState, StageKind};
