//! Item progress lines reach the log whether or not bars are drawn.
//!
//! Installs a process-wide logger, so it lives in its own test binary.

use std::sync::Mutex;

use pmcoa_core::ProgressContext;

static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct Capture;

impl log::Log for Capture {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            LINES.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

#[test]
fn item_line_logged_with_and_without_bars() {
    log::set_logger(&Capture).unwrap();
    log::set_max_level(log::LevelFilter::Info);

    let plain = ProgressContext::hidden().items("batch_0", 2);
    plain.processed(1, "PMC1");
    plain.finish();

    let bars = ProgressContext::with_bars().items("batch_1", 4);
    bars.processed(1, "PMC2");
    bars.finish();

    let lines = LINES.lock().unwrap();
    assert!(lines.contains(&"[1/2] processed PMC1 (50.00%)".to_string()));
    assert!(lines.contains(&"[1/4] processed PMC2 (25.00%)".to_string()));
}
