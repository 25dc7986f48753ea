//! Direct-to-leader transaction delivery over QUIC.
//!
//! The submission engine hands this crate signed wire bytes; it resolves the
//! upcoming leader window from a cached schedule, keeps a pooled QUIC
//! connection per TPU endpoint, and fans the transaction out to every
//! distinct leader in the window, classifying what happened per leader.

pub mod connection_pool;
pub mod leader_tracker;
pub mod outcome;
pub mod submit;

pub use {
    connection_pool::{ConnectionPool, MAX_IDLE_AGE},
    leader_tracker::{LeaderTarget, LeaderTracker},
    outcome::{SendOutcome, TpuSendError},
    submit::{LeaderReport, RoundReport, SubmitOptions, TpuClient},
};
