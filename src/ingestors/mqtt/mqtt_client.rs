use crate::config::mqtt::MqttConfig;
use rand::Rng;
use rand::distr::Alphanumeric;
use rumqttc::MqttOptions;
use std::time::Duration;

fn random_client_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(18)
        .map(char::from)
        .collect()
}

fn get_client_id(config: &MqttConfig) -> String {
    config.client_id.clone().unwrap_or_else(|| {
        let mut client_id = "pv3-collector-".to_string();
        client_id.push_str(&random_client_id());
        client_id
    })
}

pub fn make_client_options(config: &MqttConfig) -> MqttOptions {
    let mqtt_options = MqttOptions::new(get_client_id(config), config.host.as_str(), config.port);
    configure_mqtt_options(config, mqtt_options)
}

fn configure_mqtt_options(config: &MqttConfig, mut mqtt_options: MqttOptions) -> MqttOptions {
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds));

    if let Some(username) = &config.username {
        let password = config.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttConfig {
        MqttConfig {
            host: "broker.local".to_string(),
            port: 1884,
            client_id: None,
            username: None,
            password: None,
            keep_alive_seconds: 60,
        }
    }

    #[test]
    fn test_random_client_id() {
        let client_id = get_client_id(&config());
        let suffix = client_id.strip_prefix("pv3-collector-").unwrap();
        assert_eq!(suffix.len(), 18);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(client_id, get_client_id(&config()));
    }

    #[test]
    fn test_options() {
        let mut config = config();
        config.client_id = Some("fixed".to_string());
        config.username = Some("user".to_string());

        let options = make_client_options(&config);
        assert_eq!(options.client_id(), "fixed");
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), String::new()))
        );
    }
}
