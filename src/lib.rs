//! # billsift — sectioned summaries of legislative bills
//!
//! Sends a bill PDF to a hosted layout service, sorts the extracted
//! paragraphs and tables into topical sections with a chat model, writes a
//! summary per section, and scores the result against a reference document.
//!
//! ## Architecture
//!
//! - **[`extract`]** — Layout service trait, Azure client, saved-analysis loader
//! - **[`content`]** — Span-overlap filter, table flattening, chunk building
//! - **[`completion`]** — Chat completion trait, Azure client, retry policy
//! - **[`section`]** — Closed section label set and prompt lookups
//! - **[`classify`]** — Chunk → section label
//! - **[`aggregate`]** — Label buckets with unrecognized-label policy
//! - **[`generate`]** — Section text generation from buckets and exemplars
//! - **[`evaluate`]** — Per-section rating against a reference document
//! - **[`pipeline`]** — `DocumentProcessor` wiring the stages together
//! - **[`document`]** — Label-keyed section document, JSON load/save
//! - **[`config`]** — Configuration loading and validation

pub mod aggregate;
pub mod classify;
pub mod completion;
pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod generate;
pub mod pipeline;
pub mod section;
