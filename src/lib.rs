//! Build output filtering and reporting.
//!
//! A build hook feeds each tool invocation's output to an [`OutputSession`].
//! Configured [`Filter`]s classify the output line by line; matches land in a
//! report document, raw output of selected stages lands in an output document,
//! and [`OutputSession::summarize`] folds the matches of an artifact's object
//! files into one result per filter.
//!
//! Both documents are plain JSON files that survive across processes: each run
//! loads them, appends, and rewrites them whole. Two processes finalizing
//! against the same files at the same time will lose one side's updates; the
//! files are not locked.
//!
//! [`Filter`]: filter::Filter
//! [`OutputSession`]: session::OutputSession
//! [`OutputSession::summarize`]: session::OutputSession::summarize

pub mod cli;
pub mod config;
pub mod filter;
pub mod record;
pub mod report;
pub mod session;
pub mod stage;
pub mod store;
pub mod summary;
