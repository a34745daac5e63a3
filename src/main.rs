mod app;
mod commands;
mod event;
mod logging;
mod source;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tabview::config::Config;

#[derive(Parser, Debug)]
#[command(name = "tabview")]
#[command(about = "Browse, filter, sort and export JSON lists in the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/tabview/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Table to open (defaults to the first configured table)
  #[arg(short, long)]
  table: Option<String>,

  /// Rows per page
  #[arg(long)]
  page_size: Option<usize>,

  /// Always fetch; never read or write the cache
  #[arg(long)]
  no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  let mut config = Config::load(args.config.as_deref())?;
  if args.no_cache {
    config.cache.enabled = false;
  }
  if let Some(page_size) = args.page_size {
    config.view.page_size = page_size;
  }

  let table = config.table(args.table.as_deref())?;
  let cache = source::open_cache(&config.cache)?;
  let source = source::TableSource::new(table, cache)?;

  let screen = ui::views::TableScreen::new(
    table,
    config.title.clone(),
    config.view.page_size,
    source,
    config.export.dir(),
  );

  let mut app = app::App::new(Box::new(screen));
  app.run().await?;

  Ok(())
}
