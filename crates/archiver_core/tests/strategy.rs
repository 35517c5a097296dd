use archiver_core::{select_capture, ArchivePath, ArtifactTarget, CaptureStrategy};
use pretty_assertions::assert_eq;

fn archive() -> ArchivePath {
    ArchivePath::new("archive").unwrap()
}

#[test]
fn plain_url_is_mirrored_under_its_host() {
    let plan = select_capture("https://example.org");
    assert_eq!(plan.strategy, CaptureStrategy::FullSiteMirror);
    assert_eq!(plan.target_url, "https://example.org");
    assert_eq!(
        plan.destination(&archive()).unwrap().as_str(),
        "archive/example.org/index.html"
    );
    assert_eq!(
        plan.destination_dir(&archive()).unwrap().as_str(),
        "archive/example.org"
    );
}

#[test]
fn community_reference_is_rewritten_to_its_index_page() {
    let plan = select_capture("r/example");
    assert_eq!(plan.strategy, CaptureStrategy::SingleDocument);
    assert_eq!(
        plan.target,
        ArtifactTarget::CommunityReference {
            name: "example".to_string()
        }
    );
    assert_eq!(plan.target_url, "https://old.reddit.com/r/example/wiki/index");
    assert_eq!(
        plan.destination(&archive()).unwrap().as_str(),
        "archive/r/example/index.html"
    );
}

#[test]
fn community_reference_accepts_leading_and_trailing_slash() {
    for identity in ["/r/rust_lang", "r/rust_lang/", "/r/rust_lang/"] {
        let plan = select_capture(identity);
        assert_eq!(plan.strategy, CaptureStrategy::SingleDocument, "{identity}");
        assert_eq!(plan.identity, identity);
    }
}

#[test]
fn near_misses_fall_through_to_direct_urls() {
    for identity in ["r/", "r/a", "r/has-dash", "r/nested/path", "rr/example"] {
        let plan = select_capture(identity);
        assert_eq!(plan.strategy, CaptureStrategy::FullSiteMirror, "{identity}");
        assert!(matches!(plan.target, ArtifactTarget::DirectUrl { .. }));
    }
}

#[test]
fn malformed_identity_is_passed_through_without_a_destination() {
    let plan = select_capture("  not a url  ");
    assert_eq!(plan.target_url, "not a url");
    assert_eq!(plan.strategy, CaptureStrategy::FullSiteMirror);
    assert!(plan.destination(&archive()).is_none());
}

#[test]
fn mirror_destination_follows_extension_adjustment() {
    let cases = [
        ("https://example.org/docs/", "archive/example.org/docs/index.html"),
        ("https://example.org/docs/page", "archive/example.org/docs/page.html"),
        ("https://example.org/a/b.html", "archive/example.org/a/b.html"),
        ("http://localhost:8080/", "archive/localhost:8080/index.html"),
        ("https://EXAMPLE.org/x?y=1", "archive/example.org/x.html"),
    ];
    for (url, expected) in cases {
        let plan = select_capture(url);
        assert_eq!(plan.destination(&archive()).unwrap().as_str(), expected, "{url}");
    }
}

#[test]
fn unadjusted_destination_keeps_original_name() {
    let plan = select_capture("https://example.org/files/report.pdf");
    assert_eq!(
        plan.unadjusted_destination(&archive()).unwrap().as_str(),
        "archive/example.org/files/report.pdf"
    );
    assert!(select_capture("r/example")
        .unadjusted_destination(&archive())
        .is_none());
}
