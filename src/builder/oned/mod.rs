mod codabar;
mod code128;
mod code39;
mod code93;
mod itf;
mod upc_ean;

use log::debug;

use super::Writer;
use crate::common::{
    bit_matrix::BitMatrix,
    error::{BarcodeError, BarcodeResult},
    format::BarcodeFormat,
    hints::EncodeHints,
};

// One dimensional writer
//------------------------------------------------------------------------------

/// Writes every linear format. Each symbology turns the contents into a row of modules,
/// which is then stretched to the requested size with a quiet zone on both sides.
pub struct OneDWriter;

impl Writer for OneDWriter {
    fn encode(
        &self,
        contents: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> BarcodeResult<BitMatrix> {
        if contents.is_empty() {
            return Err(BarcodeError::illegal("Found empty contents"));
        }

        let code = encode_contents(contents, format, hints)?;
        let margin = hints.margin.unwrap_or_else(|| default_margin(format));
        debug!("Encoded {format} into {} modules with margin {margin}", code.len());
        render(&code, width, height, margin)
    }
}

fn encode_contents(
    contents: &str,
    format: BarcodeFormat,
    hints: &EncodeHints,
) -> BarcodeResult<Vec<bool>> {
    match format {
        BarcodeFormat::Ean13 => upc_ean::encode_ean13(contents),
        BarcodeFormat::Ean8 => upc_ean::encode_ean8(contents),
        BarcodeFormat::UpcA => upc_ean::encode_upc_a(contents),
        BarcodeFormat::UpcE => upc_ean::encode_upc_e(contents),
        BarcodeFormat::Code39 => code39::encode(contents),
        BarcodeFormat::Code93 => code93::encode(contents),
        BarcodeFormat::Code128 => code128::encode(contents, hints),
        BarcodeFormat::Itf => itf::encode(contents),
        BarcodeFormat::Codabar => codabar::encode(contents),
        BarcodeFormat::QrCode => {
            Err(BarcodeError::illegal("QR_CODE is not a one dimensional format"))
        }
    }
}

// UPC/EAN guard patterns already provide part of the quiet zone
fn default_margin(format: BarcodeFormat) -> usize {
    if format.is_upc_ean() {
        9
    } else {
        10
    }
}

/// Scales a row of modules by the largest whole factor fitting `width`, centered, and
/// repeats it over `height` rows
pub(crate) fn render(
    code: &[bool],
    width: usize,
    height: usize,
    sides_margin: usize,
) -> BarcodeResult<BitMatrix> {
    let input_width = code.len();
    let full_width = input_width + sides_margin;
    let output_width = width.max(full_width);
    let output_height = height.max(1);

    let multiple = output_width / full_width;
    let left_padding = (output_width - input_width * multiple) / 2;

    let mut output = BitMatrix::new(output_width, output_height)?;
    for (i, _) in code.iter().enumerate().filter(|(_, &dark)| dark) {
        output.set_region(left_padding + i * multiple, 0, multiple, output_height)?;
    }
    Ok(output)
}

/// Writes alternating runs of `pattern` widths into `target` starting at `pos`, the
/// first run with `start_color`. Returns the number of modules written.
pub(crate) fn append_pattern(
    target: &mut [bool],
    pos: usize,
    pattern: &[usize],
    start_color: bool,
) -> usize {
    let mut color = start_color;
    let mut num_added = 0;
    for &len in pattern {
        target[pos + num_added..pos + num_added + len].fill(color);
        num_added += len;
        color = !color;
    }
    num_added
}

pub(crate) fn check_numeric(contents: &str) -> BarcodeResult<()> {
    if contents.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(BarcodeError::illegal("Input should only contain digits 0-9"))
    }
}

/// Row of modules as "1" and "0" characters, used by the tests of every writer
#[cfg(test)]
pub(crate) fn matrix_row_string(matrix: &BitMatrix) -> String {
    (0..matrix.width()).map(|x| if matrix.get(x, 0) { '1' } else { '0' }).collect()
}
