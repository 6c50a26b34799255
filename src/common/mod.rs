pub mod bit_array;
pub mod bit_matrix;
pub mod bitstream;
pub mod charset;
pub mod codec;
pub mod ec;
pub mod error;
pub mod format;
pub mod hints;
pub mod iter;
pub mod mask;
pub mod metadata;
pub mod point;
pub mod result;

pub use bit_array::*;
pub use bit_matrix::*;
pub use bitstream::*;
pub use charset::*;
pub use error::*;
pub use format::*;
pub use hints::*;
pub use iter::*;
pub use mask::MaskPattern;
pub use metadata::{ECLevel, FormatInfo, Version};
pub use point::*;
pub use result::*;
