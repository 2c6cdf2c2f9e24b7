//! gffctx: streaming GFF2/GFF3 parser that loads one sequence region into a feature context,
//! and writes contexts back out as GFF.

pub mod error;

pub mod cli;
pub mod config;
pub mod gff;
pub mod model;
pub mod source;
pub mod strand;
pub mod term;
