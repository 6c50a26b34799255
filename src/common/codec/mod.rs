pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::*;
pub use encoder::*;
pub use types::*;

// Codec proptesting
//------------------------------------------------------------------------------

#[cfg(test)]
mod codec_proptests {

    use proptest::prelude::*;

    use super::{decode, encode};
    use crate::common::metadata::ECLevel;

    pub fn ec_level_strategy() -> BoxedStrategy<ECLevel> {
        prop_oneof![Just(ECLevel::L), Just(ECLevel::M), Just(ECLevel::Q), Just(ECLevel::H)].boxed()
    }

    proptest! {
        #[test]
        fn proptest_codec(data in "[ -~]{1,200}", ecl in ec_level_strategy()) {
            let encoded = encode(&data, ecl, None, false, None).unwrap();
            let decoded = decode(encoded.bits.data(), encoded.version, ecl, None).unwrap();
            prop_assert_eq!(data, decoded.text);
        }
    }
}
