use settings::Settings;
use tracing_subscriber::EnvFilter;
use veolia::VeoliaClient;

mod settings;
mod statestore;

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut client = VeoliaClient::new(settings.veolia.clone()).expect("Error creating client");
    client.login().await.expect("Wrong authentication");

    let outcome = client.update_all().await;
    if let Err(e) = &outcome.daily {
        tracing::error!("Daily refresh failed: {e}");
    }
    if let Err(e) = &outcome.monthly {
        tracing::error!("Monthly refresh failed: {e}");
    }

    let store =
        statestore::StateStoreClient::new(&settings.statestore).expect("Error creating state store client");

    for sensor in statestore::dashboard_sensors(client.attributes()) {
        if let Err(e) = store.publish(&sensor).await {
            tracing::error!("Error publishing {}: {e:?}", sensor.entity_id);
        }
    }

    client.close_session();
}
