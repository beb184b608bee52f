//! # quizchain
//!
//! Self-hosted service that solves chained web quizzes with an LLM.
//!
//! An inbound request names a quiz page URL. The service renders the page in
//! a headless browser, asks an LLM to synthesize a program that computes the
//! answer, evaluates that program in an isolated subprocess, discovers the
//! submission endpoint from the page text, and POSTs the answer. When the
//! endpoint confirms the answer and offers a follow-up URL, the cycle repeats
//! with the new URL until the chain terminates.
//!
//! ## Chain Flow
//!
//! ```text
//!   POST /api/quiz ──► spawn chain
//!                        │
//!          ┌─────────────▼──────────────┐
//!          │ render → synthesize →      │
//!          │ evaluate → discover →      │◄── next URL (correct + url)
//!          │ submit                     │
//!          └─────────────┬──────────────┘
//!                        ▼
//!                    terminate
//! ```
//!
//! ## Modules
//! - `api`: HTTP surface (task intake, health, chain inspection)
//! - `chain`: the per-request orchestration loop and chain registry
//! - `render`: headless page rendering via CDP
//! - `solver`: LLM program synthesis
//! - `eval`: isolated evaluation of synthesized programs
//! - `submit`: endpoint discovery and answer submission
//! - `llm`: LLM client abstraction (OpenRouter)

pub mod api;
pub mod chain;
pub mod config;
pub mod eval;
pub mod llm;
pub mod render;
pub mod solver;
pub mod submit;
