//! papyrus-arxiv: arXiv search, PDF downloads and the local paper library
//!
//! The building blocks are usable on their own ([`ArxivClient`],
//! [`Downloader`], the [`library`] functions); [`PaperTools`] bundles them
//! behind the tool-facing surface used by the agent, the MCP server and the
//! HTTP API.

pub mod atom;
pub mod client;
pub mod dates;
pub mod download;
pub mod error;
pub mod library;
pub mod paper;
pub mod query;
pub mod request;
pub mod tools;

pub use client::{ArxivClient, DEFAULT_ENDPOINT};
pub use download::Downloader;
pub use error::{Error, Result};
pub use paper::Paper;
pub use request::{Categories, DownloadRequest, PapersQuery, SearchRequest, SortBy};
pub use tools::PaperTools;
