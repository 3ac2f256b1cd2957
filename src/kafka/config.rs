use rdkafka::config::ClientConfig;
use tracing::info;

use crate::config::KafkaConfig;

/// Creates an `rdkafka` client configuration from the application settings.
///
/// Centralizes connection setup so producers and consumers agree on
/// brokers, TLS and SASL. Protocol selection:
/// - plaintext by default
/// - `ssl` when `ssl_enabled` is set
/// - `sasl_ssl` / `sasl_plaintext` when SASL credentials are present
pub fn create_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", &config.brokers);
    client_config.set("security.protocol", "plaintext");

    if config.ssl_enabled {
        info!("Enabling SSL/TLS for Kafka connection");
        client_config.set("security.protocol", "ssl");
    }

    if let (Some(mechanism), Some(username), Some(password)) = (
        &config.sasl_mechanism,
        &config.sasl_username,
        &config.sasl_password,
    ) {
        info!(sasl_mechanism = %mechanism, "Configuring SASL authentication");
        client_config
            .set("sasl.mechanism", mechanism)
            .set("sasl.username", username)
            .set("sasl.password", password);

        if config.ssl_enabled {
            client_config.set("security.protocol", "sasl_ssl");
        } else {
            client_config.set("security.protocol", "sasl_plaintext");
        }
    }

    client_config
}
