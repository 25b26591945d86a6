use super::*;

fn fresh_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit_batch").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_depth_frame(path: &Path, value: u8) {
    image::GrayImage::from_pixel(32, 8, image::Luma([value]))
        .save(path)
        .unwrap();
}

fn seeded_opts() -> BatchOpts {
    BatchOpts {
        synthesis: SynthesisOpts {
            seed: Some(3),
            ..SynthesisOpts::default()
        },
        threads: Some(2),
        ..BatchOpts::default()
    }
}

#[test]
fn trailing_digits_become_frame_index() {
    assert_eq!(frame_index_from_stem("frame_0042"), Some(42));
    assert_eq!(frame_index_from_stem("7"), Some(7));
    assert_eq!(frame_index_from_stem("frame"), None);
    assert_eq!(frame_index_from_stem("f12b"), None);
}

#[test]
fn collect_frames_orders_numerically_not_lexically() {
    let dir = fresh_dir("collect_numeric");
    for name in ["f_10.png", "f_2.png", "f_1.png", "notes.txt"] {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    let frames = collect_frames(&dir, "png").unwrap();
    let indices: Vec<u64> = frames.iter().map(|f| f.index.0).collect();
    assert_eq!(indices, vec![1, 2, 10]);
    assert!(frames[2].path.ends_with("f_10.png"));
}

#[test]
fn collect_frames_falls_back_to_name_order() {
    let dir = fresh_dir("collect_names");
    for name in ["b.PNG", "a.png", "c_1.png"] {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    let frames = collect_frames(&dir, "png").unwrap();
    let names: Vec<String> = frames
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.png", "b.PNG", "c_1.png"]);
    assert_eq!(frames[1].index, FrameIndex(1));
}

#[test]
fn frames_sharing_an_output_name_are_rejected() {
    let dir = fresh_dir("collect_dup_stems");
    for name in ["a.png", "a.PNG", "b.png"] {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    let err = collect_frames(&dir, "png").unwrap_err();
    assert!(matches!(err, StereoError::Validation(_)));
    assert!(err.to_string().contains("same output file"));
}

#[test]
fn output_path_keeps_stem_and_uses_png() {
    let frame = FrameFile {
        index: FrameIndex(4),
        path: PathBuf::from("in/frame_0004.jpg"),
    };
    assert_eq!(
        output_path_for(&frame, Path::new("out")),
        PathBuf::from("out/frame_0004.png")
    );
}

#[test]
fn run_batch_converts_every_frame_in_order() {
    let root = fresh_dir("run_ok");
    let (input, output) = (root.join("in"), root.join("out"));
    std::fs::create_dir_all(&input).unwrap();
    for i in 1..=5 {
        write_depth_frame(&input.join(format!("frame_{i:04}.png")), 0);
    }

    let report = run_batch(&input, &output, &seeded_opts()).unwrap();
    assert!(report.failed.is_empty());
    let indices: Vec<u64> = report.written.iter().map(|(i, _)| i.0).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);

    let first = image::open(&report.written[0].1).unwrap().to_luma8();
    assert_eq!(first.dimensions(), (32, 8));
    // Flat depth tiles the 4-column seed strip.
    for x in 4..32 {
        assert_eq!(first.get_pixel(x, 0), first.get_pixel(x - 4, 0));
    }
}

#[test]
fn abort_policy_surfaces_first_failure() {
    let root = fresh_dir("run_abort");
    let (input, output) = (root.join("in"), root.join("out"));
    std::fs::create_dir_all(&input).unwrap();
    write_depth_frame(&input.join("frame_0001.png"), 0);
    std::fs::write(input.join("frame_0002.png"), b"broken").unwrap();
    write_depth_frame(&input.join("frame_0003.png"), 0);

    let err = run_batch(&input, &output, &seeded_opts()).unwrap_err();
    assert!(matches!(err, StereoError::InvalidImage(_)));
}

#[test]
fn skip_policy_reports_failures_and_keeps_going() {
    let root = fresh_dir("run_skip");
    let (input, output) = (root.join("in"), root.join("out"));
    std::fs::create_dir_all(&input).unwrap();
    write_depth_frame(&input.join("frame_0001.png"), 0);
    std::fs::write(input.join("frame_0002.png"), b"broken").unwrap();
    // 32 / 8 = 4 seed columns; depth 255 shifts by 31 and runs off the row.
    write_depth_frame(&input.join("frame_0003.png"), 255);
    write_depth_frame(&input.join("frame_0004.png"), 0);

    let opts = BatchOpts {
        on_error: FrameErrorPolicy::Skip,
        ..seeded_opts()
    };
    let report = run_batch(&input, &output, &opts).unwrap();

    let written: Vec<u64> = report.written.iter().map(|(i, _)| i.0).collect();
    let failed: Vec<u64> = report.failed.iter().map(|f| f.index.0).collect();
    assert_eq!(written, vec![1, 4]);
    assert_eq!(failed, vec![2, 3]);
    assert!(report.failed[0].error.contains("invalid image"));
    assert!(report.failed[1].error.contains("index out of range"));
}

#[test]
fn empty_input_dir_is_an_error() {
    let root = fresh_dir("run_empty");
    let err = run_batch(&root, &root.join("out"), &BatchOpts::default()).unwrap_err();
    assert!(matches!(err, StereoError::Validation(_)));
}

#[test]
fn verify_frames_drops_undecodable_outputs() {
    let dir = fresh_dir("verify");
    let good = dir.join("good.png");
    let bad = dir.join("bad.png");
    write_depth_frame(&good, 10);
    std::fs::write(&bad, b"nope").unwrap();

    let valid = verify_frames(&[bad.clone(), good.clone()]).unwrap();
    assert_eq!(valid, vec![good]);
    assert!(verify_frames(&[bad]).is_err());
}

#[test]
fn bad_options_fail_validation() {
    let dotted = BatchOpts {
        extension: ".png".to_string(),
        ..BatchOpts::default()
    };
    assert!(dotted.validate().is_err());

    let no_threads = BatchOpts {
        threads: Some(0),
        ..BatchOpts::default()
    };
    assert!(no_threads.validate().is_err());
}
