use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::error::BarcodeError;

// Barcode format
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarcodeFormat {
    QrCode,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code39,
    Code93,
    Code128,
    Itf,
    Codabar,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 10] = [
        Self::QrCode,
        Self::Ean13,
        Self::Ean8,
        Self::UpcA,
        Self::UpcE,
        Self::Code39,
        Self::Code93,
        Self::Code128,
        Self::Itf,
        Self::Codabar,
    ];

    pub fn is_one_d(self) -> bool {
        !matches!(self, Self::QrCode)
    }

    pub fn is_upc_ean(self) -> bool {
        matches!(self, Self::Ean13 | Self::Ean8 | Self::UpcA | Self::UpcE)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::QrCode => "QR_CODE",
            Self::Ean13 => "EAN_13",
            Self::Ean8 => "EAN_8",
            Self::UpcA => "UPC_A",
            Self::UpcE => "UPC_E",
            Self::Code39 => "CODE_39",
            Self::Code93 => "CODE_93",
            Self::Code128 => "CODE_128",
            Self::Itf => "ITF",
            Self::Codabar => "CODABAR",
        }
    }
}

impl Display for BarcodeFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for BarcodeFormat {
    type Err = BarcodeError;

    /// Accepts the canonical names as well as lowercase or dash separated spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String =
            s.chars().filter(|c| !matches!(c, '_' | '-' | ' ')).collect::<String>().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name().replace('_', "") == norm)
            .ok_or_else(|| BarcodeError::illegal(format!("Unknown barcode format: {s}")))
    }
}

#[cfg(test)]
mod format_tests {
    use super::BarcodeFormat;
    use test_case::test_case;

    #[test_case("QR_CODE", BarcodeFormat::QrCode)]
    #[test_case("ean-13", BarcodeFormat::Ean13)]
    #[test_case("code128", BarcodeFormat::Code128)]
    #[test_case("Codabar", BarcodeFormat::Codabar)]
    fn test_from_str(s: &str, exp: BarcodeFormat) {
        assert_eq!(s.parse::<BarcodeFormat>().unwrap(), exp);
    }

    #[test]
    fn test_unknown() {
        assert!("qr".parse::<BarcodeFormat>().is_err());
        assert!("pdf417".parse::<BarcodeFormat>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for f in BarcodeFormat::ALL {
            assert_eq!(f.to_string().parse::<BarcodeFormat>().unwrap(), f);
        }
    }

    #[test]
    fn test_kinds() {
        assert!(!BarcodeFormat::QrCode.is_one_d());
        assert!(BarcodeFormat::UpcE.is_upc_ean());
        assert!(!BarcodeFormat::Itf.is_upc_ean());
    }
}
