// tests/injector.rs

use std::path::Path;

use taskpipe::errors::PipelineError;
use taskpipe::inject::{Injection, Injector, MarkerRegion, reference_path, render_reference};

fn refs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn absent_markers_leave_the_template_unchanged() {
    let template = "<html>\n<body>\n  <p>no markers here</p>\n</body>\n</html>\n";
    let injector = Injector::new(vec![Injection::new(
        MarkerRegion::named("js-lib"),
        refs(&["lib/a.js"]),
    )])
    .unwrap();

    assert_eq!(injector.inject(template), template);
}

#[test]
fn references_replace_only_the_region_in_order() {
    let template = "<body>\n    <!-- inject:js-lib -->\n    <script src=\"old.js\"></script>\n    <!-- end -->\n<p>after</p>\n</body>\n";
    let injector = Injector::new(vec![Injection::new(
        MarkerRegion::new("<!-- inject:js-lib -->", "<!-- end -->"),
        refs(&["lib/a.js", "lib/b.js"]),
    )])
    .unwrap();

    let out = injector.inject(template);
    assert_eq!(
        out,
        "<body>\n    <!-- inject:js-lib -->\n    <script src=\"lib/a.js\"></script>\n    <script src=\"lib/b.js\"></script>\n    <!-- end -->\n<p>after</p>\n</body>\n"
    );
    assert!(!out.contains("old.js"));
}

#[test]
fn output_does_not_depend_on_marker_indentation() {
    let injection = Injection::new(
        MarkerRegion::new("<!-- inject:js-lib -->", "<!-- end -->"),
        refs(&["lib/a.js", "lib/b.js"]),
    );
    let injector = Injector::new(vec![injection]).unwrap();

    for template in [
        "<!-- inject:js-lib --><!-- end -->",
        "\t\t<!-- inject:js-lib -->\n\t\t<!-- end -->",
        "  <!-- inject:js-lib -->\n\n\n      <!-- end -->",
    ] {
        let out = injector.inject(template);
        let lines: Vec<&str> = out
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("<script"))
            .collect();
        assert_eq!(
            lines,
            vec![
                "<script src=\"lib/a.js\"></script>",
                "<script src=\"lib/b.js\"></script>"
            ],
            "template {template:?}"
        );
    }
}

#[test]
fn injection_is_idempotent_over_the_same_template() {
    let template = "<head>\n  <!-- inject:css -->\n  <!-- endinject -->\n</head>";
    let injector = Injector::new(vec![Injection::new(
        MarkerRegion::named("css"),
        refs(&["css/site.css"]),
    )])
    .unwrap();

    let once = injector.inject(template);
    assert_eq!(injector.inject(template), once);
    // Re-injecting into already injected output is stable too.
    assert_eq!(injector.inject(&once), once);
    assert!(once.contains("<link rel=\"stylesheet\" href=\"css/site.css\">"));
}

#[test]
fn several_regions_are_filled_independently() {
    let template = "<!-- inject:css -->\n<!-- endinject -->\n<!-- inject:js-app -->\n<!-- endinject -->";
    let injector = Injector::new(vec![
        Injection::new(MarkerRegion::named("css"), refs(&["css/a.css"])),
        Injection::new(MarkerRegion::named("js-app"), refs(&["app/main.js"])),
    ])
    .unwrap();

    let out = injector.inject(template);
    let css = out.find("css/a.css").unwrap();
    let app_marker = out.find("<!-- inject:js-app -->").unwrap();
    let app = out.find("app/main.js").unwrap();
    assert!(css < app_marker && app_marker < app);
}

#[test]
fn empty_reference_list_leaves_region_untouched() {
    let template = "<!-- inject:js-lib -->\n<script src=\"keep.js\"></script>\n<!-- endinject -->";
    let injector =
        Injector::new(vec![Injection::new(MarkerRegion::named("js-lib"), Vec::new())]).unwrap();
    assert_eq!(injector.inject(template), template);
}

#[test]
fn start_tag_without_end_tag_is_left_alone() {
    let template = "<!-- inject:js-lib -->\n<p>dangling</p>";
    let injector = Injector::new(vec![Injection::new(
        MarkerRegion::named("js-lib"),
        refs(&["lib/a.js"]),
    )])
    .unwrap();
    assert_eq!(injector.inject(template), template);
}

#[test]
fn invalid_regions_are_rejected() {
    let dup = Injector::new(vec![
        Injection::new(MarkerRegion::named("css"), Vec::new()),
        Injection::new(MarkerRegion::named("css"), Vec::new()),
    ]);
    assert!(matches!(dup, Err(PipelineError::ConfigError(msg)) if msg.contains("duplicate")));

    let same = Injector::new(vec![Injection::new(
        MarkerRegion::new("<!-- x -->", "<!-- x -->"),
        Vec::new(),
    )]);
    assert!(matches!(same, Err(PipelineError::ConfigError(_))));

    let empty = Injector::new(vec![Injection::new(MarkerRegion::new("", "<!-- end -->"), Vec::new())]);
    assert!(matches!(empty, Err(PipelineError::ConfigError(_))));
}

#[test]
fn references_are_rendered_relative_without_leading_slash() {
    let build = Path::new("/site/build");
    assert_eq!(
        reference_path(build, Path::new("/site/build/lib/jquery.js")),
        "lib/jquery.js"
    );
    assert_eq!(render_reference("lib/a.js"), "<script src=\"lib/a.js\"></script>");
    assert_eq!(
        render_reference("css/a.css"),
        "<link rel=\"stylesheet\" href=\"css/a.css\">"
    );
    assert_eq!(render_reference("favicon.ico"), "favicon.ico");
}
