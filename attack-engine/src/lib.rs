//! Attack Engine - paced HTTP load generation
//!
//! This crate fires HTTP requests at a target at a controlled rate for a
//! bounded or unbounded duration and streams one result per hit. A hit
//! traverses a chain of requests, where a value extracted from one response
//! body can be substituted into the next request's URL.

pub mod attacker;
pub mod config;
pub mod error;
pub mod pacer;
pub mod result;
pub mod stop;
pub mod target;
pub mod targeter;
pub mod ticket;
pub mod transport;

#[cfg(test)]
mod tests;

pub use attacker::{Attacker, ResultStream, ATTACK_HEADER, SEQ_HEADER};
pub use config::AttackerConfig;
pub use error::{AttackError, AttackResult, ErrorCategory};
pub use pacer::{parse_duration, parse_std_duration, ConstantPacer, Pace, Pacer};
pub use result::{AttackStatistics, Headers, HitResult};
pub use stop::StopSignal;
pub use target::{substitute_placeholder, Target, TargetChain, ValueCache, PLACEHOLDER};
pub use targeter::{StaticTargeter, Targeter};
