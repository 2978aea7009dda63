//! Aurora: a personal assistant orchestrator for a single founder.

pub mod actions;
pub mod app;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod learning;
pub mod llm;
pub mod pipeline;
pub mod profile;
pub mod security;
pub mod storage;
pub mod wellbeing;
