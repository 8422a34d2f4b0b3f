use std::error::Error;

use bookshelf_core::{IoTaskPool, build_io_runtime, config::AppConfig};
use bookshelf_window::run_app;

mod app;
mod loading;

use app::BookshelfApp;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    log::info!("Asset root: {}", config.asset_root.display());

    // I/O lives on its own runtime, the window loop owns the main thread
    let runtime = build_io_runtime()?;
    let app = BookshelfApp::new(&config, IoTaskPool(runtime.handle().clone()));
    app.start();

    run_app(app, config.window_title.clone())?;
    Ok(())
}
