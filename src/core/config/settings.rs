use std::path::PathBuf;

use super::parsing::{
    parse_cors_origins, parse_environment, parse_store_backend, parse_u16, parse_u32,
    parse_u64, EnvSource,
};
use super::secret::{default_secret_path, load_or_create_secret_key};
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GuardPolicy,
    RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings,
    StoreBackend, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvSource::new(lookup);

        let host = env.or_default("EXAMDESK_HOST", "0.0.0.0");
        let port = env.or_default("EXAMDESK_PORT", "8000");

        let environment =
            parse_environment(env.optional("EXAMDESK_ENV").or_else(|| env.optional("ENVIRONMENT")));
        let strict_config = env.flag("EXAMDESK_STRICT_CONFIG") || environment.is_production();

        let project_name = env.or_default("PROJECT_NAME", "Examdesk API");
        let version = env.or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env.or_default("API_V1_STR", "/api/v1");

        let secret_key = match env.optional("SECRET_KEY") {
            Some(value) => value,
            None => {
                let path = env
                    .optional("EXAMDESK_SECRET_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_secret_path);
                load_or_create_secret_key(&path)
            }
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env.or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "1440"),
        )?;
        let algorithm = env.or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env.optional("BACKEND_CORS_ORIGINS"))?;

        let backend = parse_store_backend(env.optional("EXAMDESK_STORE"))?;
        let postgres_server = env.or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env.or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env.or_default("POSTGRES_USER", "examdesk");
        let postgres_password = env.or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env.or_default("POSTGRES_DB", "examdesk");
        let database_url = env.optional("DATABASE_URL");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env.or_default("DATABASE_MAX_CONNECTIONS", "20"),
        )?;

        let defaults = GuardPolicy::default();
        let policy = GuardPolicy {
            min_exam_questions: floor(&env, "MIN_EXAM_QUESTIONS", defaults.min_exam_questions)?,
            min_students: floor(&env, "MIN_STUDENTS", defaults.min_students)?,
            min_instructors: floor(&env, "MIN_INSTRUCTORS", defaults.min_instructors)?,
            min_courses: floor(&env, "MIN_COURSES", defaults.min_courses)?,
            min_courses_per_student: floor(
                &env,
                "MIN_COURSES_PER_STUDENT",
                defaults.min_courses_per_student,
            )?,
            min_courses_per_instructor: floor(
                &env,
                "MIN_COURSES_PER_INSTRUCTOR",
                defaults.min_courses_per_instructor,
            )?,
        };

        let first_admin_email = env.or_default("FIRST_ADMIN_EMAIL", "admin@examdesk.local");
        let first_admin_password = env.or_default("FIRST_ADMIN_PASSWORD", "");

        let log_level = env.or_default("EXAMDESK_LOG_LEVEL", "info");
        let json = env.flag("EXAMDESK_LOG_JSON");
        let prometheus_enabled = env.flag("PROMETHEUS_ENABLED");

        let settings = Self {
            server: ServerSettings { host: ServerHost::parse(host)?, port: ServerPort::parse(port)? },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                backend,
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            policy,
            admin: AdminSettings { first_admin_email, first_admin_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if self.policy.min_exam_questions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MIN_EXAM_QUESTIONS",
                value: "0".to_string(),
            });
        }

        if !self.runtime.strict_config {
            return Ok(());
        }

        if self.database.backend == StoreBackend::Postgres
            && self.database.database_url.is_none()
            && self.database.postgres_password.is_empty()
        {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_admin_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_ADMIN_PASSWORD"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl ServerHost {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

fn floor(env: &EnvSource<'_>, field: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env.optional(field) {
        Some(value) => parse_u32(field, value),
        None => Ok(default),
    }
}
