use std::{env, str::FromStr};

use log::warn;

use crate::error::EngineError;

/// Which backends the dispatcher may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// GPU first, CPU on failure.
    #[default]
    Auto,
    Gpu,
    Cpu,
}

impl FromStr for BackendPreference {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "gpu" => Ok(BackendPreference::Gpu),
            "cpu" => Ok(BackendPreference::Cpu),
            other => Err(EngineError::InvalidConfiguration(format!(
                "unknown backend {:?}, expected auto, gpu or cpu",
                other
            ))),
        }
    }
}

/// Engine settings read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendPreference,
    /// CPU worker count.
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            workers: num_cpus::get(),
        }
    }
}

impl Settings {
    pub const BACKEND_VAR: &'static str = "FRACTAL_BACKEND";
    pub const WORKERS_VAR: &'static str = "FRACTAL_WORKERS";

    /// Reads `FRACTAL_BACKEND` and `FRACTAL_WORKERS`; unset or unparsable
    /// values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(value) = lookup(Self::BACKEND_VAR) {
            match value.parse() {
                Ok(backend) => settings.backend = backend,
                Err(error) => warn!("ignoring {}: {}", Self::BACKEND_VAR, error),
            }
        }

        if let Some(value) = lookup(Self::WORKERS_VAR) {
            match value.trim().parse::<usize>() {
                Ok(workers) if workers > 0 => settings.workers = workers,
                _ => warn!(
                    "ignoring {}={:?}: expected a positive integer",
                    Self::WORKERS_VAR,
                    value
                ),
            }
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn reads_backend_and_workers() {
        let settings = Settings::from_lookup(lookup(&[
            ("FRACTAL_BACKEND", "CPU"),
            ("FRACTAL_WORKERS", "3"),
        ]));
        assert_eq!(settings.backend, BackendPreference::Cpu);
        assert_eq!(settings.workers, 3);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("FRACTAL_BACKEND", "quantum"),
            ("FRACTAL_WORKERS", "0"),
        ]));
        assert_eq!(settings, Settings::default());
    }
}
