use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yaolist_cos::config::load_config;
use yaolist_cos::{progress_fn, CosClient, ListOptions, StaticSigner, UploadOptions, UploadResult};

const USAGE: &str = "\
Usage: yaolist-cos <command> [args]

Commands:
  mkdir <remote_dir/> [biz_attr]        create a folder
  rmdir <remote_dir/>                   delete an empty folder
  rm <remote_file>                      delete a file
  stat <remote_path>                    show attributes (folders end with /)
  ls <remote_dir/> [prefix]             list a folder
  put <local_file> <remote_file>        upload, slicing large files
  upload <local_file> <remote_file> [--session <id>] [--slice-size <bytes>]
                                        slice upload, resumable with --session

Config is read from ./cos.json or $YAOLIST_COS_CONFIG.";

/// Config file location / 配置文件路径
fn config_path() -> PathBuf {
    std::env::var("YAOLIST_COS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cos.json"))
}

fn report(result: &UploadResult) -> anyhow::Result<()> {
    match &result.error {
        Some(e) => {
            if !result.session_id.is_empty() && e.is_resumable() {
                tracing::warn!("Resume with: --session {}", result.session_id);
            }
            bail!("upload failed: {}", e)
        }
        None => {
            let url = result
                .upload_data()
                .and_then(|d| d.access_url)
                .unwrap_or_default();
            println!("{:?} {}", result.status, url);
            Ok(())
        }
    }
}

/// Parse `upload` flags / 解析上传参数
fn upload_options(flags: &[String], cancel: CancellationToken) -> anyhow::Result<UploadOptions> {
    let mut options = UploadOptions::default().with_cancel(cancel);
    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--session" => {
                let id = iter.next().context("--session needs a value")?;
                options.session = Some(id.clone());
            }
            "--slice-size" => {
                let size = iter.next().context("--slice-size needs a value")?;
                options.slice_size = Some(size.parse().context("--slice-size must be a number")?);
            }
            "--overwrite" => options.insert_only = false,
            other => bail!("unknown flag {}\n\n{}", other, USAGE),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yaolist_cos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    if command == "--version" || command == "-V" {
        println!("yaolist-cos {} (built {})", env!("CARGO_PKG_VERSION"), env!("BUILD_TIME"));
        return Ok(());
    }
    let arg = |i: usize| args.get(i).map(String::as_str).context(USAGE);

    // Load configuration / 加载配置
    let mut config = load_config(&config_path())?;
    config.apply_env_overrides();
    let signer = Arc::new(StaticSigner::new(config.auth_token.clone()));
    let client = CosClient::with_http(config, signer)?;

    // Ctrl-C stops uploads between slices / Ctrl-C 在分片间取消上传
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current slice...");
            cancel_on_signal.cancel();
        }
    });

    match command.as_str() {
        "mkdir" => {
            client.create_folder(arg(1)?, args.get(2).map(String::as_str)).await?;
        }
        "rmdir" => {
            client.delete_folder(arg(1)?).await?;
        }
        "rm" => {
            client.delete_file(arg(1)?).await?;
        }
        "stat" => {
            let path = arg(1)?;
            let stat = if path.ends_with('/') {
                client.stat_folder(path).await?
            } else {
                client.stat_file(path).await?
            };
            println!("{}", serde_json::to_string_pretty(&stat)?);
            if let Some(modified) = stat.modified() {
                println!("modified: {}", modified);
            }
        }
        "ls" => {
            let mut options = ListOptions {
                prefix: args.get(2).cloned(),
                ..Default::default()
            };
            loop {
                let page = client.list_folder(arg(1)?, &options).await?;
                for entry in &page.infos {
                    println!("{:>12} {}", entry.filesize.unwrap_or_default(), entry.name);
                }
                if !page.has_more || page.context.is_empty() {
                    break;
                }
                options.context = Some(page.context);
            }
        }
        "put" => {
            let local = PathBuf::from(arg(1)?);
            let options = UploadOptions::default().with_cancel(cancel);
            let progress = progress_fn(|f| tracing::info!("{:.1}%", f * 100.0));
            let result = client.upload_file(arg(2)?, local, options, Some(progress)).await?;
            report(&result)?;
        }
        "upload" => {
            let local = PathBuf::from(arg(1)?);
            let options = upload_options(args.get(3..).unwrap_or_default(), cancel)?;
            let progress = progress_fn(|f| tracing::info!("{:.1}%", f * 100.0));
            let result = client.upload_slice(arg(2)?, local, options, Some(progress)).await?;
            tracing::info!("Session: {}", result.session_id);
            report(&result)?;
        }
        other => bail!("unknown command {}\n\n{}", other, USAGE),
    }

    Ok(())
}
