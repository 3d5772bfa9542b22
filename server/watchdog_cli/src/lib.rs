use tokio::sync::broadcast::Receiver;

pub mod alarm;
pub mod camera;
pub mod cli;
pub mod config;
pub mod device;
pub mod networking;
pub mod operator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    Shutdown,
}

/// Completes when a shutdown is broadcast, or when the sender is gone.
pub async fn app_shutdown_handler(mut receiver: Receiver<AppEvent>) {
    loop {
        let app_event = receiver.recv().await;
        match app_event {
            Ok(event) => match event {
                AppEvent::Shutdown => break,
            },
            Err(_) => break,
        }
    }
}
