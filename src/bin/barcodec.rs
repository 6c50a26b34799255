//! barcodec CLI - reads barcodes out of images and renders new ones as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;

use barcodec::{
    decode_image, encode, BarcodeFormat, CharacterSetEci, DecodeHints, ECLevel, EncodeHints,
    MetadataValue,
};

/// QR code and linear barcode reader and writer
#[derive(Parser)]
#[command(name = "barcodec")]
#[command(version)]
#[command(about = "Decode barcodes from images or encode text into barcode images")]
#[command(long_about = None)]
#[command(after_help = "EXAMPLES:
    barcodec decode photo.jpg scan.png
    barcodec decode --formats ean-13,upc-a --try-harder shelf.jpg
    barcodec encode qr-code 'Hello, world!' -o hello.png
    barcodec encode ean-13 590123412345 -o ean.png --width 400 --height 120

SUPPORTED FORMATS:
    QR_CODE, EAN_13, EAN_8, UPC_A, UPC_E, CODE_39, CODE_93, CODE_128, ITF, CODABAR")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode the first barcode found in each image
    #[command(visible_alias = "d")]
    Decode {
        /// Images to scan
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Only look for these formats
        #[arg(short, long, value_delimiter = ',')]
        formats: Vec<BarcodeFormat>,

        /// Spend more time looking, rotating linear codes too
        #[arg(long)]
        try_harder: bool,

        /// The image holds nothing but an unrotated symbol
        #[arg(long)]
        pure: bool,

        /// Retry on the inverted image when nothing is found
        #[arg(long)]
        inverted: bool,

        /// Character set assumed for QR byte segments without ECI
        #[arg(long)]
        charset: Option<String>,

        /// Print result metadata
        #[arg(short, long)]
        verbose: bool,
    },

    /// Encode text into a PNG image
    #[command(visible_alias = "e")]
    Encode {
        /// Barcode format, e.g. qr-code, ean-13, code-128
        format: BarcodeFormat,

        /// Contents to encode
        text: String,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Minimum width in pixels
        #[arg(short, long, default_value = "0")]
        width: usize,

        /// Minimum height in pixels
        #[arg(short = 'H', long, default_value = "0")]
        height: usize,

        /// Quiet zone, in modules for QR and in total modules for linear codes
        #[arg(short, long)]
        margin: Option<usize>,

        /// QR error correction level: L, M, Q or H
        #[arg(short, long)]
        ec_level: Option<ECLevel>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode { images, formats, try_harder, pure, inverted, charset, verbose } => {
            let mut hints = DecodeHints::new();
            hints.try_harder(try_harder).pure_barcode(pure).also_inverted(inverted);
            if !formats.is_empty() {
                hints.possible_formats(&formats);
            }
            match charset.as_deref().map(parse_charset).transpose() {
                Ok(Some(cs)) => {
                    hints.character_set(cs);
                    decode_all(&images, &hints, verbose)
                }
                Ok(None) => decode_all(&images, &hints, verbose),
                Err(e) => Err(e),
            }
        }
        Commands::Encode { format, text, output, width, height, margin, ec_level } => {
            let mut hints = EncodeHints::new();
            if let Some(margin) = margin {
                hints.margin(margin);
            }
            if let Some(ecl) = ec_level {
                hints.ec_level(ecl);
            }
            encode_to_file(&text, format, width, height, &hints, &output)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_charset(name: &str) -> Result<CharacterSetEci, Box<dyn std::error::Error>> {
    CharacterSetEci::from_name(name).ok_or_else(|| format!("Unknown character set: {name}").into())
}

// Returns whether every image held a readable barcode
fn decode_all(
    images: &[PathBuf],
    hints: &DecodeHints,
    verbose: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut all_found = true;
    for path in images {
        let img = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                all_found = false;
                continue;
            }
        };
        debug!("Loaded {} ({}x{})", path.display(), img.width(), img.height());

        match decode_image(&img, hints) {
            Ok(res) => {
                println!("{}: {} {}", path.display(), res.format(), res.text());
                if verbose {
                    for (key, value) in res.metadata() {
                        match value {
                            MetadataValue::ByteSegments(segments) => {
                                println!("  {key:?}: {} segment(s)", segments.len())
                            }
                            _ => println!("  {key:?}: {value:?}"),
                        }
                    }
                    for p in res.points() {
                        println!("  point: ({:.1}, {:.1})", p.x, p.y);
                    }
                }
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                all_found = false;
            }
        }
    }
    Ok(all_found)
}

fn encode_to_file(
    text: &str,
    format: BarcodeFormat,
    width: usize,
    height: usize,
    hints: &EncodeHints,
    output: &Path,
) -> Result<bool, Box<dyn std::error::Error>> {
    // Linear codes come back one pixel high unless asked otherwise
    let height = if format.is_one_d() && height == 0 { 80 } else { height };
    let matrix = encode(text, format, width, height, hints)?;
    // Without a requested size, QR modules are drawn four pixels wide
    let scale = if width == 0 && height == 0 { 4 } else { 1 };
    let img = matrix.to_image(scale);
    img.save(output)?;
    println!("Wrote {format} ({}x{}) to {}", img.width(), img.height(), output.display());
    Ok(true)
}
