use cinevault_core::types::FileRole;
use cinevault_scanner::classify::{classify, is_video_file, should_ignore};
use std::path::Path;

#[test]
fn recognizes_supported_video_extensions() {
    let names = [
        "movie.mp4",
        "movie.MKV",
        "movie.avi",
        "movie.mov",
        "movie.wmv",
        "movie.flv",
        "movie.webm",
        "movie.M4V",
    ];
    for name in names {
        assert!(is_video_file(name), "should detect {name}");
        assert_eq!(classify(Path::new(name)), FileRole::Video, "should classify {name}");
    }
}

#[test]
fn rejects_non_video_files() {
    let names = ["movie.srt", "movie.txt", "poster.jpg", "video.ts", "noext"];
    for name in names {
        assert!(!is_video_file(name), "should reject {name}");
    }
}

#[test]
fn ignores_download_leftovers() {
    let names = [
        ".DS_Store",
        "thumbs.db",
        ".hidden.mp4",
        "movie.mp4.part",
        "movie.mkv.tmp",
        "page.crdownload",
    ];
    for name in names {
        assert!(should_ignore(name), "should ignore {name}");
    }
    assert!(!should_ignore("movie.mp4"));
    assert!(!should_ignore("partition.mkv"));
}
