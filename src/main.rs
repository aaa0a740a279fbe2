use async_std::{channel, task};
use tracing::{error, info};
use traytracker::{log, settings::ConfigurationStore};

fn main() {
    log::parse_log_level();

    let mut store = match ConfigurationStore::initialize() {
        Ok(store) => store,
        Err(e) => log::oops(format!("Failed to load configuration: {}", e), 1),
    };

    if std::env::args().skip(1).any(|arg| arg == "--print-config") {
        match serde_json::to_string_pretty(&store.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => log::oops(format!("Failed to print configuration: {}", e), 2),
        }
        return;
    }

    let (quit_tx, quit_rx) = channel::bounded(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = quit_tx.try_send(());
    }) {
        log::oops(format!("Error setting Ctrl-C handler: {}", e), 3);
    }

    info!(
        path = %store.path().display(),
        servers = store.server_count(),
        projects = store.project_count(),
        refresh = store.general_settings().refresh_interval_in_seconds,
        "Tracking configuration, press Ctrl-C to exit"
    );

    task::block_on(async {
        let _ = quit_rx.recv().await;
    });

    // persist whatever is in memory before going away
    if let Err(e) = store.save() {
        error!("Failed saving configuration on exit: {}", e);
    }

    println!("Traytracker exiting, goodbye");
}
