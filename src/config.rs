use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Marketplace business rules
    pub commission_rate: f64,
    pub proposal_price_ceiling: f64,
    pub view_window_minutes: i64,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `init` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = lookup("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let jwt_maxage = parse_or(&lookup, "JWT_MAXAGE", 60i64)?;
        let port = parse_or(&lookup, "PORT", 8000u16)?;
        let commission_rate = parse_or(&lookup, "PLATFORM_COMMISSION_RATE", 0.10f64)?;
        let proposal_price_ceiling = parse_or(&lookup, "PROPOSAL_PRICE_CEILING", 1.5f64)?;
        let view_window_minutes = parse_or(&lookup, "PROJECT_VIEW_WINDOW_MINUTES", 60i64)?;

        if !(0.0..1.0).contains(&commission_rate) {
            return Err(ConfigError::Invalid {
                name: "PLATFORM_COMMISSION_RATE",
                value: commission_rate.to_string(),
            });
        }
        if !proposal_price_ceiling.is_finite() || proposal_price_ceiling < 1.0 {
            return Err(ConfigError::Invalid {
                name: "PROPOSAL_PRICE_CEILING",
                value: proposal_price_ceiling.to_string(),
            });
        }
        if view_window_minutes < 0 {
            return Err(ConfigError::Invalid {
                name: "PROJECT_VIEW_WINDOW_MINUTES",
                value: view_window_minutes.to_string(),
            });
        }

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            commission_rate,
            proposal_price_ceiling,
            view_window_minutes,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
    }
}
