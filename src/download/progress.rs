//! 单话下载进度：原子计数为准，CLI 进度条只做展示。

use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct EpisodeProgress {
    saved: AtomicUsize,
    bar: ProgressBar,
}

impl EpisodeProgress {
    pub(crate) fn new(label: &str, total: u32, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            saved: AtomicUsize::new(0),
            bar,
        }
    }

    /// 每成功保存一张调用一次，可跨线程。
    pub(crate) fn inc(&self) {
        self.saved.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
    }

    pub(crate) fn saved(&self) -> usize {
        self.saved.load(Ordering::Relaxed)
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_shared_across_threads() {
        let progress = EpisodeProgress::new("test", 40, false);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10 {
                        progress.inc();
                    }
                });
            }
        });
        assert_eq!(progress.saved(), 40);
        progress.finish();
    }
}
