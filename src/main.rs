//! 漫画单话下载器。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/路径/作品标识等基础设施
//! - `download`：范围、凭证、张数解析与下载主流程
//! - `network_parser`：站点接口与页面内嵌数据解析
//! - `pipeline`：属性上下文与阶段流水线

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use tracing::{info, warn};

mod base_system;
mod download;
mod network_parser;
mod pipeline;

use base_system::comic_id::parse_comic_alias;
use base_system::config::{ConfigSpec, load_or_create_with_base};
use base_system::logging::{LogOptions, LogSystem};
use base_system::settings::Config;
use download::engine::DownloadError;
use download::models::{Credentials, DownloadReport};
use network_parser::ComicSource;
use network_parser::web::{WebClient, WebConfig};
use pipeline::attribute::{Attribute, ComicAlias, RangeToken};
use pipeline::context::AttributeContext;
use pipeline::runner::PipelineRunner;
use pipeline::stages::comic_pipeline;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "comic-episode-downloader")]
#[command(about = "Comic episode downloader")]
struct Cli {
    /// 作品 alias 或作品链接
    comic: Option<String>,

    /// 单话范围，如 8、8~、~25、1~10（留空为全部）
    #[arg(long)]
    range: Option<String>,

    /// 站点语言区域（ko-KR / en-US / ja-JP）
    #[arg(long)]
    locale: Option<String>,

    /// 单话内并发下载图片
    #[arg(long, default_value_t = false)]
    concurrent: bool,

    /// 并发线程数
    #[arg(long)]
    workers: Option<usize>,

    /// 图片格式（webp / jpg）
    #[arg(long)]
    format: Option<String>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs 等文件）
    #[arg(long)]
    data_dir: Option<String>,

    /// 配置文件路径（优先于数据目录）
    #[arg(long)]
    config: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Comic Episode Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let _log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let mut config = load_or_create_with_base::<Config>(cli.config.as_deref().map(Path::new), data_dir)
        .map_err(|e| anyhow!(e.to_string()))?;
    apply_cli_overrides(&mut config, &cli)?;

    let Some(input) = cli.comic.as_deref() else {
        bail!("请指定作品 alias 或作品链接");
    };
    let alias = parse_comic_alias(input).ok_or_else(|| anyhow!("无法识别的作品标识: {input}"))?;
    if config.username.trim().is_empty() {
        bail!("未配置登录账号（config.yml 或环境变量 COMIC_DL_USERNAME）");
    }

    let client = WebClient::new(WebConfig::from_config(&config))?;
    let source: Arc<dyn ComicSource> = Arc::new(client);
    let runner = PipelineRunner::new(comic_pipeline(source, !cli.debug))?;

    let ctx = runner
        .run(initial_context(&config, alias, cli.range.clone()))
        .inspect_err(|err| {
            if err
                .downcast_ref::<DownloadError>()
                .is_some_and(DownloadError::is_expired_authority)
            {
                warn!(target: "startup", "访问凭证已过期，重新运行即可从该话继续下载");
            }
        })?;
    if let Some(report) = ctx.get::<DownloadReport>() {
        info!(
            target: "startup",
            downloaded = report.episodes_downloaded,
            skipped = report.episodes_skipped,
            saved = report.images_saved,
            failed = report.images_failed,
            "下载完成"
        );
    }
    Ok(())
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(locale) = &cli.locale {
        config.locale = locale.clone();
    }
    if let Some(format) = &cli.format {
        config.image_format = format.clone();
    }
    if cli.concurrent {
        config.concurrent = true;
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
    config.validate().map_err(|e| anyhow!(e))
}

fn initial_context(config: &Config, alias: String, range: Option<String>) -> AttributeContext {
    AttributeContext::create([
        Some(Attribute::from(Credentials::new(
            config.username.trim(),
            config.password.clone(),
        ))),
        Some(config.locale().into()),
        Some(ComicAlias(alias).into()),
        range.map(|r| RangeToken(r).into()),
        Some(config.download_options().into()),
    ])
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        ..LogOptions::default()
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use download::models::{ExecutionMode, Locale};

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "comic-episode-downloader",
            "snail",
            "--locale",
            "ja-JP",
            "--concurrent",
            "--workers",
            "8",
            "--format",
            "jpg",
        ]);
        let mut config = Config::default();
        apply_cli_overrides(&mut config, &cli).unwrap();
        assert_eq!(config.locale(), Locale::Japanese);
        assert_eq!(config.execution_mode(), ExecutionMode::Concurrent { workers: 8 });
        assert_eq!(config.image_format, "jpg");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::parse_from(["comic-episode-downloader", "--workers", "0"]);
        let mut config = Config::default();
        assert!(apply_cli_overrides(&mut config, &cli).is_err());
    }

    #[test]
    fn initial_context_carries_cli_inputs() {
        let config = Config {
            username: " reader ".to_string(),
            password: "pw".to_string(),
            ..Config::default()
        };
        let ctx = initial_context(&config, "snail".to_string(), None);
        assert_eq!(ctx.get::<ComicAlias>().unwrap().0, "snail");
        assert_eq!(ctx.get::<Credentials>().unwrap().username, "reader");
        assert!(ctx.get::<RangeToken>().is_none());
        assert_eq!(ctx.get::<Locale>(), Some(&Locale::Korean));
    }
}
