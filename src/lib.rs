#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! A Positional Burrows-Wheeler Transform engine for bi-allelic
//! haplotype panels.
//!
//! Columns are folded into a panel one site at a time ([`panel::Panel`]),
//! each column run-length coded ([`codec`]) and folded into the running
//! permutation and divergence arrays ([`sort::PrefixSort`]) in a single
//! forward pass. Once built, a panel supports long- and maximal-match
//! enumeration over its own haplotypes ([`matches`]) and matching of an
//! external query haplotype against it without re-sorting ([`matcher`]).

pub mod codec;
pub mod config;
pub mod error;
pub mod haplotype;
pub mod io;
pub mod macs;
pub mod matcher;
pub mod matches;
pub mod panel;
pub mod sort;

pub use error::{PbwtError, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenience re-exports for common call sites.
pub mod prelude {
    pub use crate::config::Options;
    pub use crate::error::{PbwtError, Result};
    pub use crate::haplotype::HaplotypeMatrix;
    pub use crate::matcher::{match_streaming, PanelIndex};
    pub use crate::matches::{report_long_matches, report_maximal_matches, DedupSink, Match};
    pub use crate::panel::{Panel, SiteRecord};
}
