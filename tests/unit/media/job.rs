use super::*;
use crate::foundation::core::Fps;

#[test]
fn default_output_sits_next_to_input() {
    assert_eq!(
        default_output_path(Path::new("clips/walk.mp4")),
        PathBuf::from("clips/walk_final_output.mp4")
    );
    assert_eq!(
        default_output_path(Path::new("walk.mov")),
        PathBuf::from("walk_final_output.mp4")
    );
}

#[test]
fn new_uses_video_pattern_div() {
    let opts = VideoJobOpts::new("in.mp4");
    assert_eq!(opts.batch.synthesis.pattern_div, 15);
    assert!(opts.split_audio);
    assert!(!opts.keep_intermediate);
    assert_eq!(opts.output_path(), PathBuf::from("in_final_output.mp4"));
}

#[test]
fn missing_input_is_rejected_before_touching_ffmpeg() {
    let opts = VideoJobOpts::new("target/definitely-missing.mp4");
    let err = run_video_job(&opts).unwrap_err();
    assert!(matches!(err, StereoError::Validation(_)));
}

#[test]
fn work_dir_guard_removes_unless_kept() {
    let root = PathBuf::from("target").join("unit_job_guard");
    let removed = create_job_dir(Some(root.as_path())).unwrap();
    std::fs::write(removed.join("x.txt"), b"x").unwrap();
    drop(WorkDirGuard::new(&removed, false));
    assert!(!removed.exists());

    let kept = create_job_dir(Some(root.as_path())).unwrap();
    drop(WorkDirGuard::new(&kept, true));
    assert!(kept.exists());
}

fn fake_source(path: &Path) -> VideoSourceInfo {
    VideoSourceInfo {
        source_path: path.to_path_buf(),
        width: 32,
        height: 8,
        fps: Fps::new(25, 1).unwrap(),
        duration_sec: 1.0,
        has_audio: false,
    }
}

fn failing_job(name: &str, keep_intermediate: bool) -> (VideoJobOpts, PathBuf) {
    let root = PathBuf::from("target").join("unit_job_fail").join(name);
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(&root).unwrap();
    // Not a video: frame extraction fails with or without ffmpeg installed.
    let input = root.join("not_a_video.mp4");
    std::fs::write(&input, b"plain text").unwrap();

    let work = root.join("work");
    let mut opts = VideoJobOpts::new(&input);
    opts.work_dir = Some(work.clone());
    opts.keep_intermediate = keep_intermediate;
    (opts, work)
}

fn job_dirs(work: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(work)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[test]
fn failed_job_keeps_work_dir_when_asked() {
    let (opts, work) = failing_job("keep", true);
    let err = run_in_work_dir(&opts, &fake_source(&opts.input)).unwrap_err();
    assert!(matches!(err, StereoError::Media(_)));

    let dirs = job_dirs(&work);
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].join("input").is_dir());
}

#[test]
fn failed_job_cleans_work_dir_by_default() {
    let (opts, work) = failing_job("clean", false);
    assert!(run_in_work_dir(&opts, &fake_source(&opts.input)).is_err());
    assert!(job_dirs(&work).is_empty());
}
