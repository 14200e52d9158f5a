//! CipherMix Backend
//!
//! Audio enhancement service for the CipherMix platform. Accepts uploaded
//! audio over HTTP, applies a named enhancement preset asynchronously, and
//! exposes the processed result for download while tracking every submission
//! in a file-mirrored metadata store.
//!
//! ## Features
//!
//! - **Asynchronous Enhancement**: uploads return immediately; each transform
//!   runs as an independent background task with bounded concurrency
//! - **Durable Submission Tracking**: in-memory submission map mirrored to a
//!   single JSON document, flushed synchronously on every state change
//! - **Preset Table**: named enhancement chains (clean, bass, lofi, fx) with
//!   an unconditional normalize-only fallback for unknown names
//! - **Collision-Free Naming**: artifact paths derived from UUID submission
//!   ids, with the download link a pure function of the id
//!
//! ## Architecture
//!
//! ```text
//! POST /upload/              uploads/                 submissions.json
//! ┌──────────────┐          ┌──────────────┐          ┌──────────────┐
//! │ Upload       │─────────▶│ {id}_{name}  │          │ id → record  │
//! │ Handler      │          └──────────────┘          └──────────────┘
//! └──────────────┘                 │                         ▲
//!        │                         ▼                         │
//!        │                  ┌──────────────┐          ┌──────────────┐
//!        └─── spawn ───────▶│ Enhancement  │─────────▶│ Metadata     │
//!                           │ Engine       │          │ Store        │
//!                           └──────────────┘          └──────────────┘
//!                                  │                         ▲
//!                                  ▼                         │
//!                           processed/               GET /submissions/
//!                           enhanced_{id}.wav ◀───── GET /download/{file}
//! ```

pub mod api;
pub mod artifacts;
pub mod config;
pub mod enhancer;
pub mod lifecycle;
pub mod metadata_store;
pub mod presets;

pub use api::{AppState, UploadResponse};
pub use artifacts::ArtifactStore;
pub use config::Config;
pub use enhancer::EnhanceError;
pub use lifecycle::{SubmissionLifecycle, UploadReceipt};
pub use metadata_store::{MetadataStore, SubmissionRecord, SubmissionStatus};
pub use presets::Stage;
