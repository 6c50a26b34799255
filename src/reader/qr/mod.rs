pub mod alignment;
pub mod decoder;
pub mod deqr;
pub mod detector;
pub mod finder;

pub use decoder::{QrCodeReader, QrDecoder};
pub use deqr::{data_blocks, DataBlock, DeQR};
pub use detector::{extract_pure_bits, Detector, DetectorResult};
pub use finder::{FinderPattern, FinderPatternFinder};
