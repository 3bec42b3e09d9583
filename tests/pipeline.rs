use lingo_shorts::caption::{CaptionFitter, CaptionRequest, HeuristicMeasurer};
use lingo_shorts::compose::{self, CaptionCue};
use lingo_shorts::config::{CaptionConfig, FontPaths};
use lingo_shorts::dialogue;
use lingo_shorts::timeline;
use std::path::Path;

const LINES: &str = r#"[
    ["Alice", "Do you drink coffee every morning?", "毎朝コーヒーを飲みますか？", 2.0],
    ["Bob", "Only on weekdays.", "平日だけです。", 3.0],
    ["Alice", "Really? Why not on weekends?", "本当？週末はどうして？", 1.5],
    ["Bob", "", "", 0.8],
    ["Bob", "On weekends I sleep until noon, so I skip breakfast entirely and go straight to lunch.", "週末は昼まで寝るので、朝ごはんを抜いてそのままお昼にします。", 4.0],
    ["Alice", "That sounds wonderful.", "[JA unavailable]", 2.5]
]"#;

#[test]
fn lines_flow_from_json_to_filter_graphs() {
    let lines = dialogue::retain_renderable(dialogue::parse_lines(LINES).unwrap());
    assert_eq!(lines.len(), 5);

    let chunks = timeline::segment(&lines, 3).unwrap();
    assert_eq!(chunks.len(), 2);
    assert!((chunks[0].end_offset - 6.5).abs() < 1e-9);
    assert!((chunks[1].end_offset - 13.0).abs() < 1e-9);

    let config = CaptionConfig::default();
    let fitter = CaptionFitter::new(config.clone(), HeuristicMeasurer::default()).unwrap();

    for chunk in &chunks {
        let slice = timeline::slice_audio(13.02, chunk).unwrap();
        assert!((slice.length - chunk.duration()).abs() < 1e-9);

        let requests: Vec<CaptionRequest> = chunk
            .lines
            .iter()
            .map(|line| CaptionRequest::from_line(line, 86, 74))
            .collect();
        let layouts = fitter.fit_all(&requests);
        assert_eq!(layouts.len(), chunk.lines.len());

        for layout in &layouts {
            assert!(layout.fits);
            assert!(layout.block_origin_y >= config.top_safe_margin);
            assert!(layout.block_bottom() <= config.bottom_limit());
            assert!(layout.font_size_primary <= 86);
        }

        let cues: Vec<CaptionCue<'_>> = chunk
            .line_windows()
            .zip(&layouts)
            .map(|((start, end, _), layout)| CaptionCue { start, end, layout })
            .collect();
        let script = compose::build_filter_graph(
            &cues,
            &config,
            &FontPaths::default(),
            30,
            Path::new("/tmp/text"),
        );
        assert!(script.graph.ends_with("[v]"));
        assert!(!script.text_files.is_empty());
    }

    // The placeholder secondary row is shown as-is; only the primary row
    // decides whether a line renders.
    let last = chunks[1].lines.last().unwrap();
    assert_eq!(last.secondary(), Some("[JA unavailable]"));
}

#[test]
fn long_line_shrinks_but_short_line_keeps_size() {
    let config = CaptionConfig::default();
    let fitter = CaptionFitter::new(config, HeuristicMeasurer::default()).unwrap();

    let short = fitter.fit("Hello", None, None, 86, 74);
    assert_eq!(short.font_size_primary, 86);

    let long_text = "On weekends I sleep until noon, so I skip breakfast entirely and go straight to lunch with my friends downtown.";
    let long = fitter.fit(long_text, Some("週末は昼まで寝るので、朝ごはんを抜いてそのまま友達と街でお昼にします。"), Some("Bob"), 86, 74);
    assert!(long.font_size_primary < 86);
    assert!(long.block_bottom() <= fitter.config().bottom_limit());
}
