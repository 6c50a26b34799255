use std::ops::Deref;

use crate::common::{
    ec::{ReedSolomonEncoder, QR_CODE_FIELD_256},
    error::{BarcodeError, BarcodeResult},
    metadata::{ECLevel, Version},
};

// ECC: Error Correction Codeword generator
pub fn ecc(
    data: &[u8],
    version: Version,
    ec_level: ECLevel,
) -> BarcodeResult<(Vec<&[u8]>, Vec<Vec<u8>>)> {
    let data_blocks = blockify(data, version, ec_level)?;

    let ecc_size_per_block = version.ecc_per_block(ec_level);
    let mut encoder = ReedSolomonEncoder::new(&QR_CODE_FIELD_256);
    let ecc_blocks = data_blocks
        .iter()
        .map(|b| ecc_per_block(&mut encoder, b, ecc_size_per_block))
        .collect::<BarcodeResult<Vec<_>>>()?;

    Ok((data_blocks, ecc_blocks))
}

/// Splits data codewords into the short blocks followed by the long ones
pub fn blockify(data: &[u8], version: Version, ec_level: ECLevel) -> BarcodeResult<Vec<&[u8]>> {
    let (block1_size, block1_count, block2_size, block2_count) =
        version.data_codewords_per_block(ec_level);

    let total_blocks = block1_count + block2_count;
    let total_block1_size = block1_size * block1_count;
    let total_size = total_block1_size + block2_size * block2_count;

    if total_size != data.len() {
        return Err(BarcodeError::illegal(format!(
            "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
            data.len(),
            total_size
        )));
    }

    let mut data_blocks = Vec::with_capacity(total_blocks);
    data_blocks.extend(data[..total_block1_size].chunks(block1_size));
    if block2_size > 0 {
        data_blocks.extend(data[total_block1_size..].chunks(block2_size));
    }
    Ok(data_blocks)
}

fn ecc_per_block(
    encoder: &mut ReedSolomonEncoder,
    block: &[u8],
    ecc_count: usize,
) -> BarcodeResult<Vec<u8>> {
    let len = block.len();
    let mut res = block.to_vec();
    res.resize(len + ecc_count, 0);
    encoder.encode(&mut res, ecc_count)?;
    Ok(res.split_off(len))
}

/// Column-wise merge: first codeword of every block, then the second, skipping blocks
/// that have run out
pub fn interleave<T: Copy, V: Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
    let max_block_size = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
    let total_size = blocks.iter().map(|b| b.len()).sum::<usize>();
    let mut res = Vec::with_capacity(total_size);
    for i in 0..max_block_size {
        for b in blocks {
            if i < b.len() {
                res.push(b[i]);
            }
        }
    }
    res
}

/// Final codeword sequence of a symbol: interleaved data blocks then interleaved ecc blocks
pub fn build_codewords(data: &[u8], version: Version, ec_level: ECLevel) -> BarcodeResult<Vec<u8>> {
    let (data_blocks, ecc_blocks) = ecc(data, version, ec_level)?;
    let mut res = interleave(&data_blocks);
    res.extend(interleave(&ecc_blocks));
    debug_assert_eq!(res.len(), version.total_codewords());
    Ok(res)
}

/// Number of codeword errors the symbol can correct, less misdecode protection codewords
pub fn error_correction_capacity(version: Version, ec_level: ECLevel) -> usize {
    let p = match (*version, ec_level) {
        (1, ECLevel::L) => 3,
        (2, ECLevel::L) | (1, ECLevel::M) => 2,
        (1, _) | (3, ECLevel::L) => 1,
        _ => 0,
    };

    (version.total_ecc(ec_level) - p) / 2
}

#[cfg(test)]
mod ec_tests {

    use super::{build_codewords, ecc, ecc_per_block, error_correction_capacity, interleave};
    use crate::common::{
        ec::{ReedSolomonEncoder, QR_CODE_FIELD_256},
        metadata::{ECLevel, Version},
    };

    fn rs() -> ReedSolomonEncoder {
        ReedSolomonEncoder::new(&QR_CODE_FIELD_256)
    }

    #[test]
    fn test_poly_mod_1() {
        let res = ecc_per_block(&mut rs(), b" [\x0bx\xd1r\xdcMC@\xec\x11\xec\x11\xec\x11", 10);
        assert_eq!(&*res.unwrap(), b"\xc4#'w\xeb\xd7\xe7\xe2]\x17");
    }

    #[test]
    fn test_poly_mod_2() {
        let res = ecc_per_block(&mut rs(), b" [\x0bx\xd1r\xdcMC@\xec\x11\xec", 13);
        assert_eq!(&*res.unwrap(), b"\xa8H\x16R\xd96\x9c\x00.\x0f\xb4z\x10");
    }

    #[test]
    fn test_poly_mod_3() {
        let res = ecc_per_block(&mut rs(), b"CUF\x86W&U\xc2w2\x06\x12\x06g&", 18);
        assert_eq!(&*res.unwrap(), b"\xd5\xc7\x0b-s\xf7\xf1\xdf\xe5\xf8\x9au\x9aoV\xa1o'");
    }

    #[test]
    fn test_add_ec_simple() {
        let msg = b" [\x0bx\xd1r\xdcMC@\xec\x11\xec\x11\xec\x11";
        let expected_ecc = [b"\xc4\x23\x27\x77\xeb\xd7\xe7\xe2\x5d\x17"];
        let (data, ecc) = ecc(msg, Version::new(1).unwrap(), ECLevel::M).unwrap();
        assert_eq!(data, [&msg[..]]);
        assert_eq!(&*ecc, expected_ecc);
    }

    #[test]
    fn test_add_ec_complex() {
        let msg = b"CUF\x86W&U\xc2w2\x06\x12\x06g&\xf6\xf6B\x07v\x86\xf2\x07&V\x16\xc6\xc7\x92\x06\
                    \xb6\xe6\xf7w2\x07v\x86W&R\x06\x86\x972\x07F\xf7vV\xc2\x06\x972\x10\xec\x11\xec\
                    \x11\xec\x11\xec";
        let expected_ec = [
            b"\xd5\xc7\x0b\x2d\x73\xf7\xf1\xdf\xe5\xf8\x9a\x75\x9a\x6f\x56\xa1\x6f\x27",
            b"\x57\xcc\x60\x3c\xca\xb6\x7c\x9d\xc8\x86\x1b\x81\xd1\x11\xa3\xa3\x78\x85",
            b"\x94\x74\xb1\xd4\x4c\x85\x4b\xf2\xee\x4c\xc3\xe6\xbd\x0a\x6c\xf0\xc0\x8d",
            b"\xeb\x9f\x05\xad\x18\x93\x3b\x21\x6a\x28\xff\xac\x52\x02\x83\x20\xb2\xec",
        ];
        let (data, ecc) = ecc(msg, Version::new(5).unwrap(), ECLevel::Q).unwrap();
        assert_eq!(data.iter().map(|b| b.len()).collect::<Vec<_>>(), [15, 15, 16, 16]);
        assert_eq!(&*ecc, &expected_ec[..]);
    }

    #[test]
    fn test_blockify_wrong_len() {
        assert!(ecc(b"abc", Version::new(1).unwrap(), ECLevel::M).is_err());
    }

    #[test]
    fn test_interleave() {
        let blocks = vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9, 0]];
        let interleaved = interleave(&blocks);
        let exp_interleaved = vec![1, 4, 7, 2, 5, 8, 3, 6, 9, 0];
        assert_eq!(interleaved, exp_interleaved);
    }

    #[test]
    fn test_build_codewords_len() {
        for v in [1, 5, 20, 40] {
            let ver = Version::new(v).unwrap();
            for ecl in ECLevel::ALL {
                let data = vec![0xec; ver.data_codewords(ecl)];
                let cw = build_codewords(&data, ver, ecl).unwrap();
                assert_eq!(cw.len(), ver.total_codewords());
            }
        }
    }

    #[test]
    fn test_error_correction_capacity() {
        assert_eq!(error_correction_capacity(Version::new(1).unwrap(), ECLevel::L), 2);
        assert_eq!(error_correction_capacity(Version::new(1).unwrap(), ECLevel::H), 8);
        assert_eq!(error_correction_capacity(Version::new(5).unwrap(), ECLevel::Q), 36);
    }
}
