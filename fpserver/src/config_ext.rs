//! Extension pour intégrer l'API de configuration de fpconfig dans fpserver
//!
//! Ce module fournit le trait `ConfigExt` qui permet d'ajouter facilement
//! l'API REST de configuration au serveur.

use crate::Server;
use anyhow::Result;
use fpconfig::{api, get_config, ApiDoc};
use utoipa::OpenApi;

/// Trait d'extension pour ajouter l'API de configuration à fpserver
pub trait ConfigExt {
    /// Enregistre les routes de configuration
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /api/config` - Récupérer toute la configuration
    /// - `GET /api/config/{path}` - Récupérer une valeur (ex: interception.session_ttl_secs)
    /// - `POST /api/config` - Mettre à jour une valeur
    /// - `GET /swagger-ui/config` - Documentation interactive Swagger
    fn init_config_api(&mut self) -> Result<()>;
}

impl ConfigExt for Server {
    fn init_config_api(&mut self) -> Result<()> {
        let config = get_config();
        self.add_openapi(api::create_router(config), ApiDoc::openapi(), "config");

        Ok(())
    }
}
