//! ProbSem - probabilistic semantic parsing with language models
//!
//! A prompt plus a test suite of natural-language sentences, each paired
//! with candidate programs, is turned into a distribution over programs by
//! scoring every program's tokens under a language model ([`scoring`]).
//! Those distributions are then calibrated against human judgments and
//! tested for agreement ([`norms`]), and summarised as tables ([`tables`]).

pub mod benchmark;
pub mod cache;
pub mod config;
pub mod model;
pub mod norms;
pub mod scoring;
pub mod stats;
pub mod tables;
