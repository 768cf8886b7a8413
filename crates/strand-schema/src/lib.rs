pub mod programs;
pub mod registry;

pub use programs::{AccountBound, AlwaysValid, BlobOpen, ImmutableOpen, LinkAccounts, LinkOpen};
pub use registry::{RecordReader, Schema, ValidationResult, Validator};
