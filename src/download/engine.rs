//! 下载主流程：逐话判断资格、解析张数、申请凭证，再按执行模式抓取图片。
//!
//! 单话之间严格串行；单话内的图片可顺序下载，也可交给线程池并发下载。
//! 单张失败只记录并跳过，张数解析失败只跳过该话；凭证解码失败或中途过期会终止整次运行。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel as channel;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::authority::{AccessAuthority, AuthorityError};
use super::image_count::{ImageCountError, ImageCountResolver};
use super::models::{
    ComicInfo, DownloadOptions, DownloadReport, Episode, EpisodeOutcome, ExecutionMode,
    ImageUrlParams, Locale, Purchases, Session, SkipReason,
};
use super::progress::EpisodeProgress;
use crate::base_system::paths::episode_folder_path;
use crate::network_parser::{ComicSource, NetworkError};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("单话 {episode} 的访问凭证不可用: {source}")]
    Authority {
        episode: String,
        #[source]
        source: AuthorityError,
    },
    #[error(transparent)]
    Source(#[from] NetworkError),
    #[error("创建目录 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    pub fn is_expired_authority(&self) -> bool {
        matches!(
            self,
            DownloadError::Authority {
                source: AuthorityError::Expired { .. },
                ..
            }
        )
    }
}

/// 单张图片失败，只在引擎内部记录。
#[derive(Debug, Error)]
enum ImageFetchError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("写入失败: {0}")]
    Io(#[from] io::Error),
}

pub struct DownloadEngine<'a> {
    source: &'a dyn ComicSource,
    session: &'a Session,
    comic: &'a ComicInfo,
    purchases: &'a Purchases,
    locale: Locale,
    options: &'a DownloadOptions,
    show_progress: bool,
    clock: fn() -> OffsetDateTime,
}

impl<'a> DownloadEngine<'a> {
    pub fn new(
        source: &'a dyn ComicSource,
        session: &'a Session,
        comic: &'a ComicInfo,
        purchases: &'a Purchases,
        locale: Locale,
        options: &'a DownloadOptions,
    ) -> Self {
        Self {
            source,
            session,
            comic,
            purchases,
            locale,
            options,
            show_progress: false,
            clock: OffsetDateTime::now_utc,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// 可下载：已购买；或免费且作品未处于过期/书架状态。返回值表示是否按已购处理。
    pub fn eligibility(&self, episode: &Episode) -> Option<bool> {
        if self.purchases.contains(episode.id) {
            Some(true)
        } else if episode.free && !self.comic.expired {
            Some(false)
        } else {
            None
        }
    }

    pub fn run(&self, selection: &[usize], comic_dir: &Path) -> Result<DownloadReport, DownloadError> {
        let mut indices = selection.to_vec();
        indices.sort_unstable();
        indices.dedup();

        let mut resolver =
            ImageCountResolver::new(self.source, self.session, self.comic, self.locale);
        let mut report = DownloadReport::default();

        for idx in indices {
            let Some(episode) = self.comic.episodes.get(idx) else {
                warn!(target: "download", index = idx, "单话序号超出范围，已忽略");
                continue;
            };
            let outcome = self.download_episode(&mut resolver, episode, comic_dir)?;
            match outcome {
                EpisodeOutcome::Skipped(reason) => {
                    info!(target: "download", episode = %episode.title, ?reason, "跳过")
                }
                EpisodeOutcome::Downloaded { saved, failed } => {
                    info!(target: "download", episode = %episode.title, saved, failed, "单话完成")
                }
            }
            report.absorb(&outcome);
        }
        Ok(report)
    }

    fn download_episode(
        &self,
        resolver: &mut ImageCountResolver<'_>,
        episode: &Episode,
        comic_dir: &Path,
    ) -> Result<EpisodeOutcome, DownloadError> {
        let Some(purchased) = self.eligibility(episode) else {
            return Ok(EpisodeOutcome::Skipped(SkipReason::NotPurchased));
        };

        let count = match resolver.resolve(episode) {
            Ok(n) => n,
            Err(ImageCountError::NotFound { .. }) => {
                return Ok(EpisodeOutcome::Skipped(SkipReason::ImageCountUnavailable));
            }
            Err(ImageCountError::Source(e)) => {
                warn!(target: "download", episode = %episode.name, error = %e, "张数解析失败，跳过该话");
                return Ok(EpisodeOutcome::Skipped(SkipReason::ImageCountUnavailable));
            }
        };
        if count < 1 {
            return Ok(EpisodeOutcome::Skipped(SkipReason::NoImages));
        }

        let dir = episode_folder_path(comic_dir, episode);
        fs::create_dir_all(&dir).map_err(|source| DownloadError::Io {
            path: dir.clone(),
            source,
        })?;

        let signed =
            self.source
                .issue_authority(self.session, self.comic, episode, purchased)?;
        let authority = AccessAuthority::decode(signed).map_err(|source| {
            DownloadError::Authority {
                episode: episode.name.clone(),
                source,
            }
        })?;
        debug!(
            target: "download",
            comic_id = authority.comic_id(),
            episode_id = authority.episode_id(),
            expires_at = %authority.expires_at(),
            count,
            "已取得单话凭证"
        );

        let progress = EpisodeProgress::new(&episode.title, count, self.show_progress);
        let result = for_each_image(self.options.mode, count, |index| {
            // 凭证不在单话中途刷新，过期即整话失败
            authority.ensure_valid_at((self.clock)())?;
            match self.fetch_image(&authority, episode, purchased, index, &dir) {
                Ok(()) => {
                    progress.inc();
                    Ok(true)
                }
                Err(e) => {
                    warn!(target: "download", episode = %episode.name, index, error = %e, "图片下载失败，已跳过");
                    Ok(false)
                }
            }
        });
        progress.finish();

        let failed = result.map_err(|source| DownloadError::Authority {
            episode: episode.name.clone(),
            source,
        })?;
        Ok(EpisodeOutcome::Downloaded {
            saved: progress.saved(),
            failed,
        })
    }

    fn fetch_image(
        &self,
        authority: &AccessAuthority,
        episode: &Episode,
        purchased: bool,
        index: u32,
        dir: &Path,
    ) -> Result<(), ImageFetchError> {
        let url = self.options.url_template.render(&ImageUrlParams {
            comic_id: self.comic.id,
            episode_id: episode.id,
            index,
            format: self.options.format,
            purchased,
            updated: self.comic.updated_at,
            policy: authority.policy(),
            signature: authority.signature(),
            key_pair_id: authority.key_pair_id(),
        });
        let bytes = self.source.fetch_bytes(&url)?;
        let path = dir.join(format!("{index}.{}", self.options.format.extension()));
        fs::write(&path, bytes)?;
        Ok(())
    }
}

/// 对 1..=count 的每个图片序号执行 `step`，返回失败张数。
///
/// `step` 返回 `Ok(true)` 表示成功、`Ok(false)` 表示可跳过的失败，
/// `Err` 为致命错误：顺序模式立即返回，并发模式下通知其余线程停止取新任务。
fn for_each_image<F>(mode: ExecutionMode, count: u32, step: F) -> Result<usize, AuthorityError>
where
    F: Fn(u32) -> Result<bool, AuthorityError> + Sync,
{
    match mode {
        ExecutionMode::Sequential => {
            let mut failed = 0;
            for index in 1..=count {
                if !step(index)? {
                    failed += 1;
                }
            }
            Ok(failed)
        }
        ExecutionMode::Concurrent { workers } => {
            let (tx, rx) = channel::unbounded::<u32>();
            for index in 1..=count {
                let _ = tx.send(index);
            }
            drop(tx);

            let failed = AtomicUsize::new(0);
            let abort = AtomicBool::new(false);
            let fatal: Mutex<Option<AuthorityError>> = Mutex::new(None);
            let workers = workers.clamp(1, (count as usize).max(1));

            std::thread::scope(|s| {
                for _ in 0..workers {
                    let rx = rx.clone();
                    let (step, failed, abort, fatal) = (&step, &failed, &abort, &fatal);
                    s.spawn(move || {
                        while let Ok(index) = rx.recv() {
                            if abort.load(Ordering::Relaxed) {
                                return;
                            }
                            match step(index) {
                                Ok(true) => {}
                                Ok(false) => {
                                    failed.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(e) => {
                                    abort.store(true, Ordering::Relaxed);
                                    if let Ok(mut slot) = fatal.lock() {
                                        slot.get_or_insert(e);
                                    }
                                    return;
                                }
                            }
                        }
                    });
                }
            });

            match fatal.into_inner() {
                Ok(Some(e)) => Err(e),
                Ok(None) => Ok(failed.into_inner()),
                Err(poisoned) => match poisoned.into_inner() {
                    Some(e) => Err(e),
                    None => Ok(failed.into_inner()),
                },
            }
        }
    }
}
