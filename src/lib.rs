#![doc = include_str!("../README.md")]

pub mod decoder;
mod error;
pub mod primitives;
pub mod processor;
pub mod profile;
pub mod sink;
pub mod source;
pub mod telemetry;

pub use decoder::{CancelToken, Decoder, DecoderOptions, Summary};
pub use error::{Error, Result};
pub use profile::{ProtocolProfile, Registry};
