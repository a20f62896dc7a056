// SPDX-License-Identifier: MIT

//! Document handling - text extraction, cleanup and section segmentation

mod clean;
pub mod extractor;
pub mod segmenter;

pub use clean::clean_text;
pub use extractor::{DocumentFormat, FileTextExtractor, TextExtractor};
pub use segmenter::{Section, SectionKind, SectionSegmenter};
