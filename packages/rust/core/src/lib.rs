//! Core merge orchestration for stitchbook.
//!
//! This crate ties together the per-document transforms, the destination
//! assembler and the table-of-contents builder into the end-to-end
//! [`pipeline::stitch`] workflow, plus the manifest [`check`].

pub mod assembler;
pub mod check;
pub mod pipeline;
pub mod toc;
