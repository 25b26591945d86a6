use super::*;

const PROBE_JSON: &str = r#"{
  "streams": [
    { "codec_type": "video", "width": 64, "height": 48, "r_frame_rate": "30000/1001" },
    { "codec_type": "audio" }
  ],
  "format": { "duration": "1.500000" }
}"#;

#[test]
fn probe_json_is_parsed() {
    let info = parse_probe_json(Path::new("clip.mp4"), PROBE_JSON.as_bytes()).unwrap();
    assert_eq!((info.width, info.height), (64, 48));
    assert_eq!(info.fps, Fps::new(30000, 1001).unwrap());
    assert!((info.duration_sec - 1.5).abs() < 1e-9);
    assert!(info.has_audio);
    assert_eq!(info.source_path, PathBuf::from("clip.mp4"));
}

#[test]
fn probe_without_video_stream_is_a_media_error() {
    let json = br#"{ "streams": [ { "codec_type": "audio" } ] }"#;
    let err = parse_probe_json(Path::new("a.wav"), json).unwrap_err();
    assert!(matches!(err, StereoError::Media(_)));
}

#[test]
fn probe_with_zero_frame_rate_is_rejected() {
    let json = br#"{ "streams": [ { "codec_type": "video", "width": 2, "height": 2, "r_frame_rate": "0/0" } ] }"#;
    assert!(parse_probe_json(Path::new("v.mp4"), json).is_err());
}

#[test]
fn ff_ratio_parsing() {
    assert_eq!(parse_ff_ratio("25/1"), Some((25, 1)));
    assert_eq!(parse_ff_ratio("25/0"), None);
    assert_eq!(parse_ff_ratio("abc"), None);
}

#[test]
fn encode_config_validation_catches_bad_values() {
    let base = EncodeConfig {
        width: 10,
        height: 10,
        fps: Fps::new(30, 1).unwrap(),
        out_path: PathBuf::from("target/out.mp4"),
        overwrite: true,
        audio: None,
    };
    assert!(base.validate().is_ok());

    assert!(
        EncodeConfig {
            width: 0,
            ..base.clone()
        }
        .validate()
        .is_err()
    );

    assert!(
        EncodeConfig {
            audio: Some(PathBuf::from("target/missing-audio.wav")),
            ..base
        }
        .validate()
        .is_err()
    );
}
