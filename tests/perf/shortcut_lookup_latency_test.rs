use std::path::PathBuf;
use std::time::Instant;

use crate::shortcut_file::ShortcutEntry;
use crate::shortcut_index::rank_matches;

fn p95_ms(samples: &mut [f64]) -> f64 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = samples.len().saturating_sub(1);
    let idx = ((last as f64) * 0.95).round() as usize;
    samples[idx.min(last)]
}

fn shortcut(name: String) -> ShortcutEntry {
    ShortcutEntry {
        shortcut_path: PathBuf::from(format!("C:\\Menu\\{name}.lnk")),
        target_path: format!("C:\\Apps\\{name}.exe"),
        name,
        launch_arguments: String::new(),
        icon_locator: None,
        cached_icon_path: None,
    }
}

#[test]
fn warm_shortcut_lookup_p95_under_15ms() {
    let mut entries: Vec<ShortcutEntry> = (0..10_000)
        .map(|i| shortcut(format!("Utility Tool {i:05}")))
        .collect();
    entries.push(shortcut("Quarterly Report Viewer".to_string()));

    for _ in 0..30 {
        let _ = rank_matches(&entries, "report", 20);
    }

    let mut batch_p95 = Vec::with_capacity(5);
    for _ in 0..5 {
        let mut samples = Vec::with_capacity(80);
        for _ in 0..80 {
            let start = Instant::now();
            let hits = rank_matches(&entries, "report", 20);
            samples.push(start.elapsed().as_secs_f64() * 1000.0);
            assert_eq!(hits.len(), 1);
        }
        batch_p95.push(p95_ms(&mut samples));
    }

    batch_p95.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_p95 = batch_p95[batch_p95.len() / 2];

    assert!(
        median_p95 <= 15.0,
        "median batch p95 too high: {median_p95:.3}ms (budget 15.0ms); batches={batch_p95:?}",
    );
}
