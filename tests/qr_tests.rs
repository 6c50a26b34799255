#[cfg(test)]
mod qr_proptests {

    use prop::string::string_regex;
    use proptest::prelude::*;

    use barcodec::*;

    pub fn ec_level_strategy() -> BoxedStrategy<ECLevel> {
        prop_oneof![Just(ECLevel::L), Just(ECLevel::M), Just(ECLevel::Q), Just(ECLevel::H)].boxed()
    }

    pub fn qr_strategy(regex: &str) -> impl Strategy<Value = (ECLevel, String)> {
        let pattern = format!(r"{regex}{{1,100}}");
        (ec_level_strategy(), string_regex(&pattern).unwrap())
    }

    fn qr_hints() -> DecodeHints {
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::QrCode]);
        hints
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn proptest_printable_ascii(params in qr_strategy("[ -~]")) {
            let (ecl, data) = params;

            let mut hints = EncodeHints::new();
            hints.ec_level(ecl);
            let matrix = encode(&data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();

            let img = matrix.to_image(3);
            let (w, h) = img.dimensions();
            let res = decode_luma(img.as_raw(), w as usize, h as usize, &qr_hints())
                .expect("Failed to read QR");

            prop_assert_eq!(res.text(), data.as_str());
            prop_assert_eq!(
                res.metadata_value(ResultMetadataKey::ErrorCorrectionLevel),
                Some(&MetadataValue::Text(ecl.to_string()))
            );
        }

        #[test]
        fn proptest_numeric(params in qr_strategy("[0-9]")) {
            let (ecl, data) = params;

            let mut hints = EncodeHints::new();
            hints.ec_level(ecl);
            let matrix = encode(&data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();

            let img = matrix.to_image(2);
            let (w, h) = img.dimensions();
            let res = decode_luma(img.as_raw(), w as usize, h as usize, &qr_hints())
                .expect("Failed to read QR");

            prop_assert_eq!(res.text(), data.as_str());
        }
    }
}

#[cfg(test)]
mod qr_tests {
    use image::{DynamicImage, GrayImage, Luma};
    use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use test_case::test_case;

    use barcodec::{
        decode_image, decode_luma, encode, BarcodeError, BarcodeFormat, CharacterSetEci,
        DecodeHints, ECLevel, EncodeHints, MetadataValue, ResultMetadataKey, Version,
    };

    fn qr_hints() -> DecodeHints {
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::QrCode]);
        hints
    }

    fn decode_gray(img: &GrayImage, hints: &DecodeHints) -> Result<String, BarcodeError> {
        let (w, h) = img.dimensions();
        decode_luma(img.as_raw(), w as usize, h as usize, hints).map(|r| r.text().to_string())
    }

    #[test_case("Hello, world!🌎".to_string(), 2, ECLevel::L; "test_qr_1")]
    #[test_case("TEST".to_string(), 1, ECLevel::M; "test_qr_2")]
    #[test_case("12345".to_string(), 1, ECLevel::Q; "test_qr_3")]
    #[test_case("OK".to_string(), 1, ECLevel::H; "test_qr_4")]
    #[test_case("B3@j🎮#Z%8v🍣K!🔑3zC^8📖&r💾F9*🔐b6🌼".repeat(3), 7, ECLevel::L; "test_qr_5")]
    #[test_case("A11111111111111".repeat(5), 7, ECLevel::M; "test_qr_6")]
    #[test_case("aAAAAAA1111111111111AAAAAAa".repeat(3), 7, ECLevel::Q; "test_qr_7")]
    #[test_case("1234567890".repeat(15), 7, ECLevel::H; "test_qr_8")]
    #[test_case("The quick brown fox jumps over the lazy dog. ".repeat(8), 17, ECLevel::M; "test_qr_9")]
    fn test_qr(data: String, version: usize, ecl: ECLevel) {
        let mut hints = EncodeHints::new();
        hints.ec_level(ecl).qr_version(Version::new(version).unwrap());
        let matrix = encode(&data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();
        assert_eq!(matrix.width(), Version::new(version).unwrap().width() + 8);

        let img = matrix.to_image(3);
        assert_eq!(decode_gray(&img, &qr_hints()).unwrap(), data);
    }

    #[test]
    fn test_qr_charset() {
        let data = "こんにちは世界";
        let mut hints = EncodeHints::new();
        hints.character_set(CharacterSetEci::ShiftJis);
        let matrix = encode(data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();
        assert_eq!(decode_gray(&matrix.to_image(3), &qr_hints()).unwrap(), data);
    }

    #[test_case(15.0)]
    #[test_case(-30.0)]
    #[test_case(45.0)]
    fn test_qr_rotated(degrees: f32) {
        let data = "rotated symbol";
        let mut hints = EncodeHints::new();
        hints.ec_level(ECLevel::M).margin(12);
        let matrix = encode(data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();

        let img = matrix.to_image(5);
        let rotated = rotate_about_center(
            &img,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Luma([255]),
        );
        assert_eq!(decode_gray(&rotated, &qr_hints()).unwrap(), data);
    }

    #[test]
    fn test_qr_damaged() {
        let data = "damaged but readable";
        let version = Version::new(5).unwrap();
        let mut hints = EncodeHints::new();
        hints.ec_level(ECLevel::H).qr_version(version).margin(4);
        let mut matrix = encode(data, BarcodeFormat::QrCode, 0, 0, &hints).unwrap();

        // Flip modules away from the finder and alignment patterns
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..8 {
            let x = rng.random_range(10..27) + 4;
            let y = rng.random_range(10..27) + 4;
            matrix.flip(x, y);
        }

        let res = decode_gray(&matrix.to_image(4), &qr_hints());
        assert_eq!(res.unwrap(), data);
    }

    #[test]
    fn test_qr_metadata() {
        let matrix = encode("metadata", BarcodeFormat::QrCode, 0, 0, &EncodeHints::new()).unwrap();
        let img = DynamicImage::ImageLuma8(matrix.to_image(4));
        let res = decode_image(&img, &qr_hints()).unwrap();

        assert_eq!(res.format(), BarcodeFormat::QrCode);
        assert_eq!(
            res.metadata_value(ResultMetadataKey::ErrorCorrectionLevel),
            Some(&MetadataValue::Text("L".into()))
        );
        assert_eq!(
            res.metadata_value(ResultMetadataKey::ErrorsCorrected),
            Some(&MetadataValue::Int(0))
        );
        assert_eq!(res.points().len(), 3);
    }

    #[test]
    fn test_qr_inverted() {
        let matrix = encode("light on dark", BarcodeFormat::QrCode, 0, 0, &EncodeHints::new());
        let mut img = matrix.unwrap().to_image(4);
        image::imageops::invert(&mut img);

        let mut hints = qr_hints();
        assert!(decode_gray(&img, &hints).is_err());
        hints.also_inverted(true);
        assert_eq!(decode_gray(&img, &hints).unwrap(), "light on dark");
    }

    #[test]
    fn test_qr_pure_barcode() {
        let matrix = encode("pure", BarcodeFormat::QrCode, 0, 0, &EncodeHints::new()).unwrap();
        let mut hints = qr_hints();
        hints.pure_barcode(true);
        assert_eq!(decode_gray(&matrix.to_image(2), &hints).unwrap(), "pure");
    }

    #[test]
    fn test_nothing_to_find() {
        // A lone dark block is neither a finder pattern nor a bar sequence
        let img = GrayImage::from_fn(160, 120, |x, y| {
            let inside = (60..100).contains(&x) && (40..80).contains(&y);
            Luma([if inside { 20 } else { 235 }])
        });
        assert_eq!(decode_gray(&img, &DecodeHints::new()), Err(BarcodeError::NotFound));
    }
}
