// # Convert Module
//
// Client for the remote binary-to-GPX conversion service (`POST /convert-fit`).

mod client;

pub use client::{ConversionClient, ConversionError, HttpConversionClient};
