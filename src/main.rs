mod app;
mod config;
mod document;
mod event;
mod host;
mod render;
mod schedule;
mod settings;
mod template;
mod theme;

use app::StyleboxApp;
use config::{StyleboxConfig, CONFIG_FILE};
use eframe::egui;
use render::Pipeline;
use schedule::Scheduler;
use settings::store::{JsonFileStore, PersistenceAdapter};
use settings::SETTINGS_FILE;
use std::sync::mpsc;
use tracing::info;

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("STYLEBOX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("stylebox=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    let config_dir = config::config_dir();
    let config = StyleboxConfig::load_or_default(&config_dir.join(CONFIG_FILE));
    info!(dir = %config_dir.display(), "configuration loaded");

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("stylebox-runtime")
        .build()?;
    let scheduler = Scheduler::new(tx, runtime.handle().clone());

    let store = JsonFileStore::new(config_dir.join(SETTINGS_FILE));
    info!(settings = %store.path().display(), "template store");
    let (pipeline, rejections) =
        Pipeline::load(PersistenceAdapter::new(Box::new(store)), config.replacement_mode);

    let app = StyleboxApp::new(rx, scheduler, config, pipeline, rejections);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Stylebox",
        native_options,
        Box::new(move |creation_context| {
            app.theme().apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
