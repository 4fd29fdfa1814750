// src/lib.rs
//! Turns reference images and short creative notes into cinematic
//! image-generation prompts with two chained model calls, and revises
//! single prompts on request.
use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use crate::services::{PromptPipeline, RevisionLocks};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PromptPipeline>,
    pub revision_locks: Arc<RevisionLocks>,
}
