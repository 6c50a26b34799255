mod decoder;
mod encoder;
mod galois;
mod poly;

pub use decoder::ReedSolomonDecoder;
pub use encoder::ReedSolomonEncoder;
pub use galois::{GenericGF, DATA_MATRIX_FIELD_256, QR_CODE_FIELD_256};
pub use poly::GFPoly;
