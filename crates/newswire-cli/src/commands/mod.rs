pub mod articles;
pub mod cleanup;
pub mod run;
pub mod schedule;
pub mod sources;
pub mod stats;
