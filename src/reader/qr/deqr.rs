use log::{debug, trace};

use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    iter::EncRegionIter,
    metadata::{
        ECLevel, FormatInfo, Version, FORMAT_INFO_COORDS_QR_MAIN, FORMAT_INFO_COORDS_QR_SIDE,
        VERSION_INFO_COORDS_BL, VERSION_INFO_COORDS_TR,
    },
};

// Sampled QR symbol
//------------------------------------------------------------------------------

/// Reads format information, version and codewords out of a sampled symbol. In mirror
/// mode rows and columns are swapped while reading format and version information.
#[derive(Debug, Clone)]
pub struct DeQR {
    bits: BitMatrix,
    parsed_version: Option<Version>,
    parsed_format_info: Option<FormatInfo>,
    mirror: bool,
}

impl DeQR {
    pub fn new(bits: BitMatrix) -> BarcodeResult<Self> {
        let dimension = bits.height();
        if dimension < 21 || dimension & 0x03 != 1 || bits.width() != dimension {
            return Err(BarcodeError::Format);
        }
        Ok(Self { bits, parsed_version: None, parsed_format_info: None, mirror: false })
    }

    pub fn bits(&self) -> &BitMatrix {
        &self.bits
    }

    fn dimension(&self) -> usize {
        self.bits.height()
    }

    // Coordinates are (row, column), negative ones counting from the far edge
    fn get(&self, r: i16, c: i16) -> bool {
        let w = self.dimension() as i16;
        let r = (if r < 0 { r + w } else { r }) as usize;
        let c = (if c < 0 { c + w } else { c }) as usize;
        if self.mirror {
            self.bits.get(r, c)
        } else {
            self.bits.get(c, r)
        }
    }

    fn get_number(&self, coords: &[(i16, i16)]) -> u32 {
        coords.iter().fold(0, |acc, &(r, c)| (acc << 1) | u32::from(self.get(r, c)))
    }

    pub fn read_format_info(&mut self) -> BarcodeResult<FormatInfo> {
        if let Some(fi) = self.parsed_format_info {
            return Ok(fi);
        }
        let main = self.get_number(&FORMAT_INFO_COORDS_QR_MAIN);
        let side = self.get_number(&FORMAT_INFO_COORDS_QR_SIDE);
        let fi = FormatInfo::decode(main, side).ok_or(BarcodeError::Format)?;
        trace!("Format info {main:#017b} / {side:#017b}: {} mask {}", fi.ec_level, *fi.mask);
        self.parsed_format_info = Some(fi);
        Ok(fi)
    }

    /// Version from the symbol size, or from the version information blocks for version 7
    /// and above. The top right block is tried before the bottom left one.
    pub fn read_version(&mut self) -> BarcodeResult<Version> {
        if let Some(v) = self.parsed_version {
            return Ok(v);
        }
        let dimension = self.dimension();
        let provisional = (dimension - 17) / 4;
        if provisional <= 6 {
            return Version::new(provisional).map_err(|_| BarcodeError::Format);
        }

        for coords in [&VERSION_INFO_COORDS_TR, &VERSION_INFO_COORDS_BL] {
            let bits = self.get_number(coords);
            match Version::decode_version_information(bits) {
                Ok(v) if v.width() == dimension => {
                    self.parsed_version = Some(v);
                    return Ok(v);
                }
                _ => trace!("Unreadable version info {bits:#020b}"),
            }
        }
        Err(BarcodeError::Format)
    }

    fn unmask(&mut self, fi: FormatInfo) {
        let dimension = self.dimension();
        for r in 0..dimension {
            for c in 0..dimension {
                if fi.mask.is_masked(r, c) {
                    self.bits.flip(c, r);
                }
            }
        }
    }

    /// Unmasks the symbol and reads every codeword in placement order. The matrix is
    /// left unmasked until [`Self::remask`] is called.
    pub fn read_codewords(&mut self) -> BarcodeResult<Vec<u8>> {
        let fi = self.read_format_info()?;
        let version = self.read_version()?;
        self.unmask(fi);

        let function_pattern = version.build_function_pattern()?;
        let total = version.total_codewords();
        let mut res = Vec::with_capacity(total);
        let mut current_byte = 0u8;
        let mut bits_read = 0;
        for (r, c) in EncRegionIter::new(version).filter(|&(r, c)| !function_pattern.get(c, r)) {
            current_byte = (current_byte << 1) | u8::from(self.bits.get(c, r));
            bits_read += 1;
            if bits_read == 8 {
                res.push(current_byte);
                bits_read = 0;
                current_byte = 0;
            }
        }
        // Trailing remainder bits never complete a byte
        if res.len() != total {
            return Err(BarcodeError::Format);
        }
        Ok(res)
    }

    /// Reapplies the mask taken off by [`Self::read_codewords`]
    pub fn remask(&mut self) {
        if let Some(fi) = self.parsed_format_info {
            self.unmask(fi);
        }
    }

    /// Switches reading mode and forgets what was read so far
    pub fn set_mirror(&mut self, mirror: bool) {
        self.parsed_version = None;
        self.parsed_format_info = None;
        self.mirror = mirror;
    }

    /// Transposes the matrix in place
    pub fn mirror(&mut self) {
        debug!("Transposing sampled symbol for a mirrored read");
        self.bits.transpose();
    }
}

// Data blocks
//------------------------------------------------------------------------------

/// Codewords of one Reed-Solomon block, data first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub num_data_codewords: usize,
    pub codewords: Vec<u8>,
}

/// Splits interleaved codewords back into their blocks. Short blocks come first and
/// long blocks hold one extra data codeword.
pub fn data_blocks(
    raw_codewords: &[u8],
    version: Version,
    ec_level: ECLevel,
) -> BarcodeResult<Vec<DataBlock>> {
    if raw_codewords.len() != version.total_codewords() {
        return Err(BarcodeError::illegal(format!(
            "Expected {} codewords, found {}",
            version.total_codewords(),
            raw_codewords.len()
        )));
    }

    let (short_size, short_count, long_size, long_count) =
        version.data_codewords_per_block(ec_level);
    let ecc = version.ecc_per_block(ec_level);
    let num_blocks = short_count + long_count;

    let mut blocks = (0..num_blocks)
        .map(|i| {
            let num_data_codewords = if i < short_count { short_size } else { long_size };
            DataBlock {
                num_data_codewords,
                codewords: Vec::with_capacity(num_data_codewords + ecc),
            }
        })
        .collect::<Vec<_>>();

    let mut raw = raw_codewords.iter().copied();
    let mut next = || raw.next().ok_or(BarcodeError::Format);

    for _ in 0..short_size {
        for block in blocks.iter_mut() {
            block.codewords.push(next()?);
        }
    }
    for block in blocks.iter_mut().skip(short_count) {
        block.codewords.push(next()?);
    }
    for _ in 0..ecc {
        for block in blocks.iter_mut() {
            block.codewords.push(next()?);
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod deqr_tests {
    use test_case::test_case;

    use super::{data_blocks, DeQR};
    use crate::builder::{blockify, build_codewords, QRBuilder};
    use crate::common::{
        bit_matrix::BitMatrix,
        codec::encode,
        error::BarcodeError,
        mask::MaskPattern,
        metadata::{ECLevel, FormatInfo, Version},
    };

    fn symbol(data: &str, version: usize, ecl: ECLevel, mask: u8) -> BitMatrix {
        QRBuilder::new(data)
            .version(Version::new(version).unwrap())
            .ec_level(ecl)
            .mask(MaskPattern::new(mask).unwrap())
            .build()
            .unwrap()
            .render(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_dimension() {
        assert_eq!(
            DeQR::new(BitMatrix::square(22).unwrap()).unwrap_err(),
            BarcodeError::Format
        );
        assert_eq!(
            DeQR::new(BitMatrix::square(17).unwrap()).unwrap_err(),
            BarcodeError::Format
        );
        assert!(DeQR::new(BitMatrix::square(21).unwrap()).is_ok());
    }

    #[test_case(1, ECLevel::M, 5)]
    #[test_case(4, ECLevel::H, 0)]
    #[test_case(9, ECLevel::Q, 7)]
    #[test_case(24, ECLevel::L, 2)]
    fn test_read_format_and_version(version: usize, ecl: ECLevel, mask: u8) {
        let bits = symbol("Hello, world!", version, ecl, mask);
        let mut parser = DeQR::new(bits).unwrap();
        let exp = FormatInfo::new(ecl, MaskPattern::new(mask).unwrap());
        assert_eq!(parser.read_format_info(), Ok(exp));
        assert_eq!(parser.read_version(), Ok(Version::new(version).unwrap()));
    }

    #[test]
    fn test_read_version_from_bottom_left() {
        let mut bits = symbol("Hello, world!", 7, ECLevel::L, 1);
        let w = bits.width();
        // Wipe the top right version block
        for y in 0..6 {
            for x in w - 11..w - 8 {
                bits.unset(x, y);
            }
        }
        let mut parser = DeQR::new(bits).unwrap();
        assert_eq!(parser.read_version(), Ok(Version::new(7).unwrap()));
    }

    #[test_case("Hello, world!", 1, ECLevel::L)]
    #[test_case("0123456789", 5, ECLevel::H)]
    #[test_case("MIXED blocks 1234", 10, ECLevel::Q)]
    fn test_read_codewords(data: &str, version: usize, ecl: ECLevel) {
        let v = Version::new(version).unwrap();
        let encoded = encode(data, ecl, None, false, Some(v)).unwrap();
        let exp = build_codewords(encoded.bits.data(), v, ecl).unwrap();

        let bits = symbol(data, version, ecl, 3);
        let mut parser = DeQR::new(bits.clone()).unwrap();
        assert_eq!(parser.read_codewords().unwrap(), exp);
        parser.remask();
        assert_eq!(parser.bits(), &bits);
    }

    #[test]
    fn test_mirrored_read() {
        let bits = symbol("mirror", 2, ECLevel::M, 6);
        let mut mirrored = bits.clone();
        mirrored.transpose();

        let mut parser = DeQR::new(mirrored).unwrap();
        parser.set_mirror(true);
        let fi = parser.read_format_info().unwrap();
        assert_eq!(fi.ec_level, ECLevel::M);
        assert_eq!(*fi.mask, 6);
        parser.mirror();
        assert_eq!(parser.bits(), &bits);
    }

    #[test_case(1, ECLevel::L)]
    #[test_case(5, ECLevel::Q)]
    #[test_case(13, ECLevel::M)]
    fn test_data_blocks(version: usize, ecl: ECLevel) {
        let v = Version::new(version).unwrap();
        let data = (0..v.data_codewords(ecl)).map(|i| i as u8).collect::<Vec<_>>();
        let codewords = build_codewords(&data, v, ecl).unwrap();

        let blocks = data_blocks(&codewords, v, ecl).unwrap();
        let exp = blockify(&data, v, ecl).unwrap();
        assert_eq!(blocks.len(), exp.len());
        for (block, exp_data) in blocks.iter().zip(exp) {
            assert_eq!(block.num_data_codewords, exp_data.len());
            assert_eq!(&block.codewords[..exp_data.len()], exp_data);
            assert_eq!(block.codewords.len(), exp_data.len() + v.ecc_per_block(ecl));
        }
    }

    #[test]
    fn test_data_blocks_wrong_length() {
        let v = Version::new(1).unwrap();
        assert!(matches!(
            data_blocks(&[0; 10], v, ECLevel::L),
            Err(BarcodeError::IllegalArgument(_))
        ));
    }
}
