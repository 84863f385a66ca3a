// SPDX-License-Identifier: GPL-3.0-only

//! Still-image output pipeline: one-shot requests and encoding

pub mod encoding;
pub mod request;

pub use encoding::{EncodedImage, EncodingFormat, PhotoEncoder};
pub use request::OutputRequests;
