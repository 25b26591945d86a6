use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        StereoError::invalid_image("x")
            .to_string()
            .contains("invalid image:")
    );
    assert!(
        StereoError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(StereoError::media("x").to_string().contains("media error:"));
    assert!(
        StereoError::DegeneratePattern {
            width: 4,
            pattern_div: 9
        }
        .to_string()
        .contains("degenerate pattern:")
    );
}

#[test]
fn index_out_of_range_reports_coordinates() {
    let msg = StereoError::IndexOutOfRange {
        x: 3,
        y: 1,
        source_x: 11,
        width: 16,
    }
    .to_string();
    assert!(msg.starts_with("index out of range:"));
    assert!(msg.contains("(3, 1)"));
    assert!(msg.contains("11"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = StereoError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
