pub mod cli;
pub mod cluster;
pub mod convert;
pub mod input;
pub mod logging;
pub mod matrices;
pub mod outliers;
pub mod output;
pub mod stats;
pub mod tree;
