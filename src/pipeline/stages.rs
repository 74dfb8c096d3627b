//! 具体阶段：login → comic → purchase → select → target → download。

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use super::attribute::{Attribute, ComicAlias, EpisodeSelection, RangeToken, TargetDirectory};
use super::context::AttributeContext;
use super::stage::{Dependency, Stage};
use crate::base_system::paths::comic_folder_name;
use crate::download::engine::DownloadEngine;
use crate::download::models::{
    ComicInfo, Credentials, DownloadOptions, Locale, Purchases, Session,
};
use crate::download::range::EpisodeRange;
use crate::network_parser::ComicSource;

fn locale_of(ctx: &AttributeContext) -> Locale {
    ctx.get::<Locale>().copied().unwrap_or_default()
}

pub struct LoginStage {
    source: Arc<dyn ComicSource>,
}

impl Stage for LoginStage {
    fn name(&self) -> &'static str {
        "login"
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::Independent)
    }

    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>> {
        let credentials = ctx.require::<Credentials>()?.clone();
        let session = self
            .source
            .login(locale_of(ctx), &credentials)
            .with_context(|| format!("账号 {} 登录失败", credentials.username))?;
        info!(target: "pipeline", username = %credentials.username, user_id = session.user_id, "登录成功");

        // 登录后不再需要明文密码
        ctx.update_in_place([Attribute::from(credentials.redacted())]);
        Ok(Some(session.into()))
    }
}

pub struct ComicStage {
    source: Arc<dyn ComicSource>,
}

impl Stage for ComicStage {
    fn name(&self) -> &'static str {
        "comic"
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::After("login"))
    }

    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>> {
        let alias = ctx.require::<ComicAlias>()?;
        let session = ctx.require::<Session>()?;
        let comic = self
            .source
            .fetch_comic(locale_of(ctx), session, &alias.0)
            .with_context(|| format!("获取作品 {} 信息失败", alias.0))?;
        info!(
            target: "pipeline",
            title = %comic.title,
            episodes = comic.episodes.len(),
            expired = comic.expired,
            "作品信息已获取"
        );
        Ok(Some(comic.into()))
    }
}

pub struct PurchaseStage {
    source: Arc<dyn ComicSource>,
}

impl Stage for PurchaseStage {
    fn name(&self) -> &'static str {
        "purchase"
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::After("comic"))
    }

    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>> {
        let session = ctx.require::<Session>()?;
        let comic = ctx.require::<ComicInfo>()?;
        let purchases = self
            .source
            .fetch_purchases(session, comic)
            .context("获取已购列表失败")?;
        info!(target: "pipeline", purchased = purchases.episode_ids.len(), "已购列表已获取");
        Ok(Some(purchases.into()))
    }
}

pub struct SelectStage;

impl Stage for SelectStage {
    fn name(&self) -> &'static str {
        "select"
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::After("purchase"))
    }

    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>> {
        let comic = ctx.require::<ComicInfo>()?;
        let token = ctx.get::<RangeToken>().map(|t| t.0.as_str()).unwrap_or("");
        let total = comic.episodes.len();

        let range = EpisodeRange::parse(token)?;
        range.validate(total)?;
        let indices = range.resolve(total);
        info!(target: "pipeline", %range, total, selected = indices.len(), "单话范围已确定");
        Ok(Some(EpisodeSelection(indices).into()))
    }
}

pub struct TargetStage;

impl Stage for TargetStage {
    fn name(&self) -> &'static str {
        "target"
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::After("select"))
    }

    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>> {
        let comic = ctx.require::<ComicInfo>()?;
        let options = ctx.require::<DownloadOptions>()?;
        let dir = options
            .save_root
            .join(comic_folder_name(&comic.alias, Some(&comic.title)));
        fs::create_dir_all(&dir).with_context(|| format!("创建目录 {} 失败", dir.display()))?;
        info!(target: "pipeline", dir = %dir.display(), "保存目录已就绪");
        Ok(Some(TargetDirectory(dir).into()))
    }
}

pub struct DownloadStage {
    source: Arc<dyn ComicSource>,
    show_progress: bool,
}

impl Stage for DownloadStage {
    fn name(&self) -> &'static str {
        "download"
    }

    fn dependency(&self) -> Option<Dependency> {
        Some(Dependency::After("target"))
    }

    fn execute(&self, ctx: &mut AttributeContext) -> Result<Option<Attribute>> {
        let session = ctx.require::<Session>()?;
        let comic = ctx.require::<ComicInfo>()?;
        let default_purchases = Purchases::default();
        let purchases = ctx.get::<Purchases>().unwrap_or(&default_purchases);
        let options = ctx.require::<DownloadOptions>()?;
        let selection = ctx.require::<EpisodeSelection>()?;
        let target = ctx.require::<TargetDirectory>()?;

        let report = DownloadEngine::new(
            self.source.as_ref(),
            session,
            comic,
            purchases,
            locale_of(ctx),
            options,
        )
        .with_progress(self.show_progress)
        .run(&selection.0, &target.0)?;
        Ok(Some(report.into()))
    }
}

/// 完整的下载流水线。
pub fn comic_pipeline(source: Arc<dyn ComicSource>, show_progress: bool) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(LoginStage {
            source: source.clone(),
        }) as Box<dyn Stage>,
        Box::new(ComicStage {
            source: source.clone(),
        }),
        Box::new(PurchaseStage {
            source: source.clone(),
        }),
        Box::new(SelectStage),
        Box::new(TargetStage),
        Box::new(DownloadStage {
            source,
            show_progress,
        }),
    ]
}
