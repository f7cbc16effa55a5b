//! Extension pour lire les réglages d'interception depuis fpconfig
//!
//! Ce module fournit le trait `QueueConfigExt` qui construit les
//! [`EngineOptions`] à partir de la section `interception` de la configuration.
//!
//! # Exemple
//!
//! ```no_run
//! use fpconfig::get_config;
//! use fpqueue::{QueueConfigExt, QueueEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let options = get_config().get_engine_options()?;
//! let engine = QueueEngine::new(options);
//! # Ok(())
//! # }
//! ```

use crate::engine::EngineOptions;
use anyhow::Result;
use fpconfig::Config;
use std::time::Duration;

/// Trait d'extension pour la configuration du moteur de file d'attente
pub trait QueueConfigExt {
    /// Construit les options du moteur
    ///
    /// Une durée de session nulle est remplacée par la valeur par défaut,
    /// une taille de lot nulle par 1.
    fn get_engine_options(&self) -> Result<EngineOptions>;

    /// Enregistre les options du moteur
    fn set_engine_options(&self, options: &EngineOptions) -> Result<()>;
}

impl QueueConfigExt for Config {
    fn get_engine_options(&self) -> Result<EngineOptions> {
        let defaults = EngineOptions::default();

        let ttl_secs = self.get_session_ttl_secs()?;
        let session_ttl = if ttl_secs == 0 {
            tracing::warn!(
                "interception.session_ttl_secs is 0, using {}s",
                defaults.session_ttl.as_secs()
            );
            defaults.session_ttl
        } else {
            Duration::from_secs(ttl_secs)
        };

        Ok(EngineOptions {
            session_ttl,
            default_batch_size: self.get_default_batch_size()?.max(1),
        })
    }

    fn set_engine_options(&self, options: &EngineOptions) -> Result<()> {
        self.set_session_ttl_secs(options.session_ttl.as_secs())?;
        self.set_default_batch_size(options.default_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_default_engine_options() {
        let (_dir, config) = temp_config();
        assert_eq!(config.get_engine_options().unwrap(), EngineOptions::default());
    }

    #[test]
    fn test_engine_options_round_trip_and_clamp() {
        let (_dir, config) = temp_config();
        config
            .set_engine_options(&EngineOptions {
                session_ttl: Duration::from_secs(12),
                default_batch_size: 0,
            })
            .unwrap();

        let options = config.get_engine_options().unwrap();
        assert_eq!(options.session_ttl, Duration::from_secs(12));
        assert_eq!(options.default_batch_size, 1);

        config.set_session_ttl_secs(0).unwrap();
        assert_eq!(
            config.get_engine_options().unwrap().session_ttl,
            EngineOptions::default().session_ttl
        );
    }
}
