#[cfg(test)]
pub mod test {
    use std::time::Duration;

    use crate::config::Config;
    use crate::env::MapEnv;

    /// Environment satisfying [`server_config`]'s one required key.
    pub fn server_env() -> MapEnv {
        MapEnv::new().with("API_KEY", "s3cr3t-val")
    }

    /// A small server config covering the common definition shapes:
    ///
    /// | key       | type       | env      | flag      | default     |
    /// |-----------|------------|----------|-----------|-------------|
    /// | `PORT`    | int64      | PORT     | port      | 8080        |
    /// | `HOST`    | string     | HOST     |           | localhost   |
    /// | `API_KEY` | secret     | API_KEY  | api-key   | (required)  |
    /// | `TIMEOUT` | duration   |          |           | 30s         |
    /// | `TAGS`    | []string   | TAGS     |           |             |
    pub fn server_config(env: MapEnv) -> Config {
        let mut config = Config::with_env(env);
        config
            .define("PORT")
            .int64()
            .env("PORT")
            .flag("port")
            .default(8080)
            .range(1.0, 65535.0)
            .description("HTTP listen port");
        config
            .define("HOST")
            .env("HOST")
            .default("localhost")
            .description("Bind address");
        config
            .define("API_KEY")
            .env("API_KEY")
            .flag("api-key")
            .required()
            .secret()
            .min_length(8);
        config
            .define("TIMEOUT")
            .duration()
            .default(Duration::from_secs(30));
        config.define("TAGS").string_list().env("TAGS");
        config
    }

    #[test]
    fn server_config_loads_defaults() {
        let mut config = server_config(server_env());
        assert!(config.process().is_empty());
        assert_eq!(config.get_int64("PORT"), 8080);
        assert_eq!(config.get_string("HOST"), "localhost");
        assert!(config.get_secret("API_KEY").is_set());
    }
}
