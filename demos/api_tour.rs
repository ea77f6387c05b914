//! Walk through the image handle API.
//!
//! ```text
//! cargo run --example api_tour -- [INPUT.tif] [OUTPUT.jpg] [SECOND.tif]
//! ```
//!
//! Decodes a file, writes it as JPEG, decodes a second file from memory,
//! prints its properties, changes its resolution and prints it again.

use exact_image::imaging::{Image, Quality};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "testsuite/tif/4.2.04.tif".into());
    let output = args.next().unwrap_or_else(|| "test.jpg".into());
    let second = args.next().unwrap_or_else(|| "testsuite/tif/5.1.13.tif".into());

    let mut image = Image::new();

    if let Err(e) = image.decode_file(&input) {
        println!("something went wrong decoding {input}: {e}");
        return ExitCode::FAILURE;
    }
    println!("image decoded all fine.");

    if let Err(e) = image.encode_file(&output, Quality::new(80), "") {
        println!("something went wrong writing {output}: {e}");
        return ExitCode::FAILURE;
    }
    println!("image written all fine.");

    // advanced use: decode from bytes already in memory
    let decoded = std::fs::read(&second)
        .map_err(exact_image::ImageError::from)
        .and_then(|bits| image.decode(&bits));
    if let Err(e) = decoded {
        println!("something went wrong decoding {second} from memory: {e}");
        return ExitCode::FAILURE;
    }
    println!("image read from RAM.");

    println!("Width: {}", image.width());
    println!("Height: {}", image.height());
    println!("Xres: {}", image.xres());
    println!("Yres: {}", image.yres());
    println!("Channels: {}", image.channels());
    println!("Channel depth: {}", image.channel_depth());

    image.set_xres(144);
    image.set_yres(144);

    println!("Xres: {}", image.xres());
    println!("Yres: {}", image.yres());

    drop(image);
    ExitCode::SUCCESS
}
