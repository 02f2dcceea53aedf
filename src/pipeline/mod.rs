//! I/O stages of the resume pipeline.
//!
//! The pure stages (splitting, section extraction, scoring) live at the crate
//! root; everything here touches the file system, pdfium or the network.
//!
//! ```text
//! input ──▶ pdf (read) ──▶ splitter ──▶ pdf (write)
//!                              │
//!                              └──▶ llm ──▶ scoring ──▶ persist
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`pdf`]: page text and page copying; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`llm`]: structured field extraction with retry/backoff; the only
//!    stage that talks to a model
//! 4. [`persist`]: per-candidate CSV/JSON files and the token usage summary

pub mod input;
pub mod llm;
pub mod pdf;
pub mod persist;
