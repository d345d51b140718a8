use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Immutable application configuration, built once at startup and shared by `Arc`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub membership: MembershipConfig,
    pub partner: PartnerConfig,
    pub retry: RetryConfig,
    pub activation: ActivationConfig,
    pub database: DatabaseConfig,
    pub branding: BrandingConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Used when neither the request body nor the Host mapping names a condominium
    pub default_organization_id: String,
    pub organization_id_required: bool,
    /// Lowercased host (no port) -> organization id
    pub tenant_hosts: HashMap<String, String>,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    pub base_url: String,
    pub app_token: String,
    pub access_token: String,
    pub timeout_secs: u64,
    /// Highest condominium id probed when the directory listing is unavailable
    pub scan_fallback_max_id: u32,
    pub listing_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Fixed bearer token; when set, OAuth2 client credentials are skipped
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
    pub token_refresh_margin_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Defer registration and SSO until the member confirms their email
    TwoStep,
    /// Register and issue SSO as soon as the tax ID is validated
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    pub mode: ActivationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub table_name: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandingConfig {
    pub app_name: String,
    pub app_subtitle: String,
    pub logo_url: String,
    pub company_name: String,
    pub company_email: String,
    pub company_phone: String,
    pub theme_color: String,
    pub secondary_color: String,
    pub language: String,
}

/// User-facing response texts. `{name}` in `welcome_back` is replaced by the first name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    pub confirm_email_new: String,
    pub confirm_email_existing: String,
    pub activation_success: String,
    pub activation_manual: String,
    pub welcome_back: String,
    pub account_active: String,
    pub revoked: String,
    pub not_found: String,
    pub confirmation_restart: String,
    pub email_mismatch: String,
}

impl AppConfig {
    /// Environment preset, overlaid with an optional YAML file, then with env vars
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::preset(Self::environment_from_env());

        if let Some(path) = path {
            if path.exists() {
                config = config.with_yaml_file(path)?;
            } else {
                tracing::warn!("config file {} not found, using defaults", path.display());
            }
        }

        Ok(config.with_env_overrides())
    }

    fn environment_from_env() -> Environment {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_yaml_file(self, path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.with_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay a (possibly partial) YAML document on top of this config
    pub fn with_yaml(self, content: &str) -> Result<Self, serde_yaml::Error> {
        let mut base = serde_yaml::to_value(&self)?;
        let overlay: serde_yaml::Value = serde_yaml::from_str(content)?;
        merge_yaml(&mut base, overlay);
        serde_yaml::from_value(base)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Ok(v) = env::var("DEFAULT_CONDO_ID") {
            self.server.default_organization_id = v;
        }
        if let Ok(v) = env::var("CONDO_ID_REQUIRED") {
            self.server.organization_id_required = v.parse().unwrap_or(self.server.organization_id_required);
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = v.parse().unwrap_or(self.server.request_timeout_secs);
        }

        // Membership directory overrides
        if let Ok(v) = env::var("MEMBERSHIP_API_URL") {
            self.membership.base_url = v;
        }
        if let Ok(v) = env::var("MEMBERSHIP_APP_TOKEN") {
            self.membership.app_token = v;
        }
        if let Ok(v) = env::var("MEMBERSHIP_ACCESS_TOKEN") {
            self.membership.access_token = v;
        }
        if let Ok(v) = env::var("MEMBERSHIP_TIMEOUT_SECS") {
            self.membership.timeout_secs = v.parse().unwrap_or(self.membership.timeout_secs);
        }

        // Partner overrides
        if let Ok(v) = env::var("PARTNER_API_URL") {
            self.partner.base_url = v;
        }
        if let Ok(v) = env::var("PARTNER_CLIENT_ID") {
            self.partner.client_id = v;
        }
        if let Ok(v) = env::var("PARTNER_CLIENT_SECRET") {
            self.partner.client_secret = v;
        }
        if let Ok(v) = env::var("PARTNER_BEARER_TOKEN") {
            self.partner.bearer_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Ok(v) = env::var("PARTNER_TIMEOUT_SECS") {
            self.partner.timeout_secs = v.parse().unwrap_or(self.partner.timeout_secs);
        }

        // Retry overrides
        if let Ok(v) = env::var("MAX_RETRIES") {
            self.retry.max_attempts = v.parse().unwrap_or(self.retry.max_attempts);
        }
        if let Ok(v) = env::var("RETRY_BASE_DELAY_MS") {
            self.retry.base_delay_ms = v.parse().unwrap_or(self.retry.base_delay_ms);
        }

        // Activation
        match env::var("ACTIVATION_MODE").as_deref() {
            Ok("direct") => self.activation.mode = ActivationMode::Direct,
            Ok("two_step") => self.activation.mode = ActivationMode::TwoStep,
            _ => {}
        }

        // Database
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|u| !u.is_empty());
        }
        if let Ok(v) = env::var("DB_COLLECTION_NAME") {
            self.database.table_name = v;
        }

        // Branding
        if let Ok(v) = env::var("APP_NAME") {
            self.branding.app_name = v;
        }
        if let Ok(v) = env::var("COMPANY_NAME") {
            self.branding.company_name = v;
        }
        if let Ok(v) = env::var("THEME_COLOR") {
            self.branding.theme_color = v;
        }

        self
    }

    /// Whether the CORS layer should allow any origin
    pub fn cors_is_permissive(&self) -> bool {
        self.server.cors_origins.is_empty() || self.server.cors_origins.iter().any(|o| o == "*")
    }

    /// Organization id for a request host, falling back to the default
    pub fn organization_for_host(&self, host: &str) -> String {
        let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
        self.server
            .tenant_hosts
            .get(&host)
            .cloned()
            .unwrap_or_else(|| self.server.default_organization_id.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                default_organization_id: String::new(),
                organization_id_required: false,
                tenant_hosts: HashMap::from([("localhost".to_string(), "4".to_string())]),
                cors_origins: vec!["*".to_string()],
                request_timeout_secs: 60,
            },
            membership: MembershipConfig::default(),
            partner: PartnerConfig {
                base_url: "https://api.staging.clubeparcerias.com.br/api-client/v1".to_string(),
                ..PartnerConfig::default()
            },
            retry: RetryConfig::default(),
            activation: ActivationConfig { mode: ActivationMode::TwoStep },
            database: DatabaseConfig::default(),
            branding: BrandingConfig::default(),
            messages: MessagesConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                cors_origins: vec!["http://localhost:8080".to_string(), "http://localhost:3000".to_string()],
                ..Self::development().server
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 10,
                ..Self::development().database
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                default_organization_id: "4".to_string(),
                organization_id_required: false,
                tenant_hosts: HashMap::from([
                    ("viplounge.com.br".to_string(), "4".to_string()),
                    ("www.viplounge.com.br".to_string(), "4".to_string()),
                    ("mobile.viplounge.com.br".to_string(), "4".to_string()),
                ]),
                cors_origins: vec![
                    "https://viplounge.com.br".to_string(),
                    "https://www.viplounge.com.br".to_string(),
                    "https://mobile.viplounge.com.br".to_string(),
                ],
                request_timeout_secs: 45,
            },
            partner: PartnerConfig {
                base_url: "https://infratech.clubeparcerias.com.br/api-client/v1".to_string(),
                ..PartnerConfig::default()
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 5,
                ..Self::development().database
            },
            ..Self::development()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            table_name: "leads".to_string(),
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.superlogica.net/v2/condor".to_string(),
            app_token: String::new(),
            access_token: String::new(),
            timeout_secs: 5,
            scan_fallback_max_id: 50,
            listing_page_size: 100,
        }
    }
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            bearer_token: None,
            timeout_secs: 20,
            token_refresh_margin_secs: 300,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            app_name: "mobile".to_string(),
            app_subtitle: "Acesso Exclusivo".to_string(),
            logo_url: "/images/logo.png".to_string(),
            company_name: "mobile".to_string(),
            company_email: "contato@mobile.com".to_string(),
            company_phone: "+55 11 9999-9999".to_string(),
            theme_color: "0066cc".to_string(),
            secondary_color: "0052a3".to_string(),
            language: "pt-BR".to_string(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            confirm_email_new: "Encontramos seu cadastro! Confirme seu e-mail para ativar o Clube de Benefícios.".to_string(),
            confirm_email_existing: "Bem-vindo de volta! Confirme seu e-mail para acessar o Clube de Benefícios.".to_string(),
            activation_success: "Conta ativada com sucesso! Redirecionando...".to_string(),
            activation_manual: "Você tem direito ao benefício! Clique para ativar sua conta.".to_string(),
            welcome_back: "Bem-vindo de volta, {name}! Redirecionando...".to_string(),
            account_active: "Sua conta está ativa! Acesse o Clube de Benefícios.".to_string(),
            revoked: "Seu acesso ao Clube não está mais disponível pois você não consta como condômino.".to_string(),
            not_found: "CPF não encontrado. Seja um condômino para ter acesso aos benefícios exclusivos!".to_string(),
            confirmation_restart: "Não foi possível confirmar seus dados. Recomece a validação.".to_string(),
            email_mismatch: "O e-mail informado não confere. Recomece a validação.".to_string(),
        }
    }
}

impl MessagesConfig {
    pub fn welcome_back_for(&self, first_name: &str) -> String {
        self.welcome_back.replace("{name}", first_name)
    }
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.activation.mode, ActivationMode::TwoStep);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.membership.timeout_secs, 5);
        assert_eq!(config.partner.timeout_secs, 20);
        assert!(config.cors_is_permissive());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.cors_is_permissive());
        assert_eq!(config.server.default_organization_id, "4");
        assert!(config.partner.bearer_token.is_none());
    }

    #[test]
    fn yaml_overlay_keeps_unset_fields() {
        let yaml = r#"
activation:
  mode: direct
retry:
  max_attempts: 5
branding:
  app_name: VIP Lounge
"#;
        let config = AppConfig::development().with_yaml(yaml).unwrap();
        assert_eq!(config.activation.mode, ActivationMode::Direct);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.branding.app_name, "VIP Lounge");
        assert_eq!(config.branding.language, "pt-BR");
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = AppConfig::development().with_yaml("activation: { mode: sometimes }");
        assert!(result.is_err());
    }

    #[test]
    fn host_mapping_strips_port_and_case() {
        let mut config = AppConfig::development();
        config.server.default_organization_id = "-1".to_string();
        assert_eq!(config.organization_for_host("LOCALHOST:8080"), "4");
        assert_eq!(config.organization_for_host("unknown.example.com"), "-1");
    }

    #[test]
    fn welcome_back_substitutes_name() {
        let messages = MessagesConfig::default();
        assert_eq!(messages.welcome_back_for("Ana"), "Bem-vindo de volta, Ana! Redirecionando...");
    }
}
