use std::io::Cursor;

use super::*;

fn png_bytes(img: image::DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn first_channel_of_rgb_is_used_by_default() {
    let img = image::RgbImage::from_raw(2, 1, vec![10, 20, 30, 200, 100, 0]).unwrap();
    let bytes = png_bytes(image::DynamicImage::ImageRgb8(img));

    let depth = decode_depth_map(&bytes, false, DepthChannel::default()).unwrap();
    assert_eq!((depth.width, depth.height), (2, 1));
    assert_eq!(depth.data, vec![10, 200]);
}

#[test]
fn invert_applies_before_extraction() {
    let img = image::RgbImage::from_raw(2, 1, vec![10, 20, 30, 200, 100, 0]).unwrap();
    let bytes = png_bytes(image::DynamicImage::ImageRgb8(img));

    let depth = decode_depth_map(&bytes, true, DepthChannel::FirstOfRgb).unwrap();
    assert_eq!(depth.data, vec![245, 55]);
}

#[test]
fn grayscale_sources_keep_their_values() {
    let img = image::GrayImage::from_raw(3, 2, vec![0, 50, 100, 150, 200, 255]).unwrap();
    let bytes = png_bytes(image::DynamicImage::ImageLuma8(img.clone()));

    for channel in [DepthChannel::FirstOfRgb, DepthChannel::Luma] {
        let depth = decode_depth_map(&bytes, false, channel).unwrap();
        assert_eq!(depth.data, img.as_raw().clone());
    }
    assert_eq!(DepthMap::from_gray(&img).unwrap().data, img.into_raw());
}

#[test]
fn luma_channel_weights_colors() {
    let img = image::RgbImage::from_raw(1, 1, vec![0, 255, 0]).unwrap();
    let depth =
        DepthMap::from_dynamic_image(&image::DynamicImage::ImageRgb8(img), false, DepthChannel::Luma)
            .unwrap();
    // Green dominates luma but is absent from the red channel.
    assert!(depth.data[0] > 100);
}

#[test]
fn undecodable_bytes_are_invalid_image() {
    let err = decode_depth_map(b"definitely not a png", false, DepthChannel::FirstOfRgb)
        .unwrap_err();
    assert!(matches!(err, StereoError::InvalidImage(_)));
}

#[test]
fn missing_file_is_invalid_image() {
    let err = load_depth_map(
        Path::new("target/does-not-exist/depth.png"),
        false,
        DepthChannel::FirstOfRgb,
    )
    .unwrap_err();
    assert!(matches!(err, StereoError::InvalidImage(_)));
    assert!(err.to_string().contains("depth.png"));
}

#[test]
fn load_depth_map_reads_from_disk() {
    let dir = std::path::PathBuf::from("target").join("unit_depth_load");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("depth.png");
    image::GrayImage::from_raw(4, 3, (0..12).map(|v| v * 20).collect())
        .unwrap()
        .save(&path)
        .unwrap();

    let depth = load_depth_map(&path, false, DepthChannel::FirstOfRgb).unwrap();
    assert_eq!((depth.width, depth.height), (4, 3));
    assert_eq!(depth.get(3, 2), 220);
}
