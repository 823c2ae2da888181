use tracing::info;

use super::*;

pub async fn ready(ready: &serenity::Ready, data: &BotData) {
    info!("Connected as {}", ready.user.name);

    data.read().await.monitor.mark_ready();
}
