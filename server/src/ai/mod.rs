//! Prompt-driven suggestions backed by a generative text model.

pub mod client;
pub mod decode;
pub mod service;

pub use client::{GeminiClient, GenerativeClient};
pub use service::{AiService, ScheduleBlock, SuggestedTask, TaskBrief, TaskRanking, WorkingHours};
