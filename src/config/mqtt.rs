use confique::Config;

#[derive(Debug, Clone, Config)]
pub struct MqttConfig {
    #[config(env = "MQTT_HOST", default = "localhost")]
    pub host: String,

    #[config(env = "MQTT_PORT", default = 1883)]
    pub port: u16,

    /// A random `pv3-collector-*` id is generated when unset.
    #[config(env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[config(env = "MQTT_USERNAME")]
    pub username: Option<String>,

    #[config(env = "MQTT_PASSWORD")]
    pub password: Option<String>,

    #[config(env = "MQTT_KEEP_ALIVE_SECONDS", default = 60)]
    pub keep_alive_seconds: u64,
}

impl MqttConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
