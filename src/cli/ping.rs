use super::fallback_engine;
use crate::config::Config;
use crate::die;

pub(crate) async fn ping_cmd(config: &Config) {
    let engine = fallback_engine(config);

    match engine.ping().await {
        Ok(elapsed) => println!(
            "{} ping OK ({} ms)",
            engine.registry().active_model(),
            elapsed.as_millis()
        ),
        Err(err) => die!("ping failed: {}", err),
    }
}
