//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per batch (cleared on completion).
//! Non-TTY mode: `[index/total] processed <id> (<pct>%)` log lines.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Per-batch item bar
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<24.dim} {bar:30.green/dim} {pos:>6}/{len:6} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Context that never draws bars (tests, piped output).
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Context that draws bars even when stderr is not detected as a TTY.
    pub fn with_bars() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: true,
        }
    }

    /// Item counter for one batch of `total` items.
    pub fn items(&self, name: &str, total: usize) -> ItemProgress {
        let bar = if self.is_tty {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(bar_style());
            // Truncate long names to keep bars aligned
            let display: String = name.chars().take(24).collect();
            pb.set_prefix(display);
            pb
        } else {
            ProgressBar::hidden()
        };
        ItemProgress { bar, total }
    }

    /// Create a stage status line managed by MultiProgress.
    ///
    /// Update with `pb.set_message(...)`; call `pb.finish_and_clear()` when done.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-batch item counter.
pub struct ItemProgress {
    bar: ProgressBar,
    total: usize,
}

impl ItemProgress {
    /// Report that the `index`-th (1-based) item finished.
    ///
    /// The progress line is logged in both modes; on a TTY the default
    /// filter hides it unless `--debug` or `RUST_LOG` asks for info.
    pub fn processed(&self, index: usize, id: &str) {
        self.bar.set_position(index as u64);
        self.bar.set_message(id.to_string());
        log::info!("{}", item_line(index, self.total, id));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// `[index/total] processed <id> (<pct>%)`
pub fn item_line(index: usize, total: usize, id: &str) -> String {
    let pct = if total == 0 {
        100.0
    } else {
        index as f64 * 100.0 / total as f64
    };
    format!("[{index}/{total}] processed {id} ({pct:.2}%)")
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
